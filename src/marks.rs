use std::collections::HashMap;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::models::{
    Grade, MarkRecord, MarksSummary, PerformanceBand, SittingScore, StudentStanding,
    SubjectRollup,
};

/// Ordered threshold table; the first row whose floor the percentage reaches wins.
const GRADE_TABLE: [(f64, Grade); 5] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::B),
    (60.0, Grade::C),
    (50.0, Grade::D),
];

impl Grade {
    pub fn label(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
            Grade::Absent => "AB",
        }
    }

    pub fn color_class(&self) -> &'static str {
        match self {
            Grade::APlus | Grade::A => "text-emerald-400",
            Grade::B => "text-blue-400",
            Grade::C => "text-amber-400",
            Grade::D => "text-orange-400",
            Grade::F => "text-rose-400",
            Grade::Absent => "text-slate-400",
        }
    }
}

impl PerformanceBand {
    pub fn color_class(&self) -> &'static str {
        match self {
            PerformanceBand::Strong => "bg-emerald-500",
            PerformanceBand::Fair => "bg-amber-500",
            PerformanceBand::Weak => "bg-rose-500",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceBand::Strong => "Strong",
            PerformanceBand::Fair => "Fair",
            PerformanceBand::Weak => "Weak",
        }
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Grade", 2)?;
        state.serialize_field("label", self.label())?;
        state.serialize_field("colorClass", self.color_class())?;
        state.end()
    }
}

impl Serialize for PerformanceBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PerformanceBand", 2)?;
        state.serialize_field("label", self.label())?;
        state.serialize_field("colorClass", self.color_class())?;
        state.end()
    }
}

pub fn classify(percentage: f64) -> Grade {
    GRADE_TABLE
        .iter()
        .find(|(floor, _)| percentage >= *floor)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::F)
}

pub fn grade_for(record: &MarkRecord) -> Grade {
    match sitting_percentage(record) {
        Some(pct) => classify(pct),
        None => Grade::Absent,
    }
}

pub fn band(percentage: f64) -> PerformanceBand {
    if percentage >= 75.0 {
        PerformanceBand::Strong
    } else if percentage >= 50.0 {
        PerformanceBand::Fair
    } else {
        PerformanceBand::Weak
    }
}

/// Percentage for one sitting, `None` when the learner was absent.
pub fn sitting_percentage(record: &MarkRecord) -> Option<f64> {
    record
        .marks_obtained
        .map(|obtained| ratio_percent(obtained, record.max_marks))
}

/// `totalObtained / totalMax * 100` over graded sittings, one decimal.
pub fn overall_percentage(marks: &[MarkRecord]) -> f64 {
    let (obtained, max) = graded_totals(marks.iter());
    round_1(ratio_percent(obtained, max))
}

pub fn summarize(marks: &[MarkRecord]) -> MarksSummary {
    let (total_obtained, total_max) = graded_totals(marks.iter());

    MarksSummary {
        total_obtained,
        total_max,
        overall_percentage: round_1(ratio_percent(total_obtained, total_max)),
        graded_count: marks.iter().filter(|m| m.marks_obtained.is_some()).count(),
        subjects: subject_rollups(marks),
    }
}

pub fn summarize_for(marks: &[MarkRecord], student_id: i64) -> MarksSummary {
    let own: Vec<MarkRecord> = marks
        .iter()
        .filter(|m| m.student_id == student_id)
        .cloned()
        .collect();
    summarize(&own)
}

/// Subjects in order of first appearance.
pub fn subject_rollups(marks: &[MarkRecord]) -> Vec<SubjectRollup> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&MarkRecord>> = HashMap::new();

    for mark in marks {
        groups
            .entry(mark.subject.as_str())
            .or_insert_with(|| {
                order.push(mark.subject.as_str());
                Vec::new()
            })
            .push(mark);
    }

    order
        .into_iter()
        .filter_map(|subject| groups.remove(subject).map(|group| rollup(subject, &group)))
        .collect()
}

fn rollup(subject: &str, group: &[&MarkRecord]) -> SubjectRollup {
    let graded: Vec<&&MarkRecord> = group.iter().filter(|m| m.marks_obtained.is_some()).collect();
    let graded_count = graded.len();
    let (sum_obtained, sum_max) = graded_totals(graded.iter().map(|m| **m));

    let (average_obtained, average_max) = if graded_count == 0 {
        (0.0, 0.0)
    } else {
        (
            sum_obtained / graded_count as f64,
            sum_max / graded_count as f64,
        )
    };
    let percentage = round_1(ratio_percent(average_obtained, average_max));
    let grade = if graded_count == 0 {
        Grade::Absent
    } else {
        classify(percentage)
    };

    SubjectRollup {
        subject: subject.to_string(),
        graded_count,
        absent_count: group.len() - graded_count,
        average_obtained,
        average_max,
        percentage,
        grade,
        band: band(percentage),
        sittings: group
            .iter()
            .map(|m| SittingScore {
                exam_type: m.exam_type.clone(),
                obtained: m.marks_obtained,
                max: m.max_marks,
                percentage: sitting_percentage(m).map(round_1),
                grade: grade_for(m),
            })
            .collect(),
    }
}

/// Mean of whole-number subject percentages, rounded. Subjects with no graded sitting are left out.
pub fn class_average(rollups: &[SubjectRollup]) -> f64 {
    let graded: Vec<f64> = rollups
        .iter()
        .filter(|r| r.graded_count > 0)
        .map(|r| ratio_percent(r.average_obtained, r.average_max).round())
        .collect();
    if graded.is_empty() {
        return 0.0;
    }
    (graded.iter().sum::<f64>() / graded.len() as f64).round()
}

/// Learners ordered best first by overall percentage; ties keep ascending id.
pub fn rank_students(marks: &[MarkRecord]) -> Vec<StudentStanding> {
    let mut totals: HashMap<i64, (f64, f64, usize)> = HashMap::new();
    for mark in marks {
        let entry = totals.entry(mark.student_id).or_insert((0.0, 0.0, 0));
        if let Some(obtained) = mark.marks_obtained {
            entry.0 += obtained;
            entry.1 += mark.max_marks;
            entry.2 += 1;
        }
    }

    let mut standings: Vec<StudentStanding> = totals
        .into_iter()
        .filter(|(_, (_, _, graded))| *graded > 0)
        .map(|(student_id, (obtained, max, _))| {
            let percentage = round_1(ratio_percent(obtained, max));
            StudentStanding {
                student_id,
                percentage,
                grade: classify(percentage),
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.student_id.cmp(&b.student_id))
    });
    standings
}

pub fn top_performers(marks: &[MarkRecord], limit: usize) -> Vec<StudentStanding> {
    rank_students(marks).into_iter().take(limit).collect()
}

pub fn low_performers(marks: &[MarkRecord], limit: usize) -> Vec<StudentStanding> {
    let mut ranked = rank_students(marks);
    ranked.reverse();
    ranked.into_iter().take(limit).collect()
}

fn graded_totals<'a, I>(marks: I) -> (f64, f64)
where
    I: Iterator<Item = &'a MarkRecord>,
{
    marks.fold((0.0, 0.0), |(obtained, max), mark| match mark.marks_obtained {
        Some(value) => (obtained + value, max + mark.max_marks),
        None => (obtained, max),
    })
}

fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    part / whole * 100.0
}

pub fn round_1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
