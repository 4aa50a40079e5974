use crate::attendance::{EXCELLENT_ATTENDANCE_FROM, LOW_ATTENDANCE_BELOW};
use crate::models::{AssignmentProgress, AttendanceSummary, Insight, MarksSummary, Severity};

pub const MAX_INSIGHTS: usize = 2;

fn performance_rule(marks: &MarksSummary) -> Option<Insight> {
    if marks.graded_count == 0 {
        return None;
    }
    let avg = marks.overall_percentage;
    let insight = if avg >= 85.0 {
        Insight {
            severity: Severity::Success,
            text: format!("Excellent academic performance with an overall score of {avg:.1}%."),
        }
    } else if avg >= 60.0 {
        Insight {
            severity: Severity::Info,
            text: format!("Steady performance at {avg:.1}% overall; a little more revision can push it higher."),
        }
    } else {
        Insight {
            severity: Severity::Warning,
            text: format!("Overall score of {avg:.1}% needs attention; focus on the weakest subjects first."),
        }
    };
    Some(insight)
}

fn attendance_rule(attendance: &AttendanceSummary) -> Option<Insight> {
    if attendance.total == 0 {
        return None;
    }
    let pct = attendance.percentage;
    if pct < LOW_ATTENDANCE_BELOW {
        Some(Insight {
            severity: Severity::Danger,
            text: format!(
                "Attendance is {pct:.0}%, below the {LOW_ATTENDANCE_BELOW:.0}% threshold."
            ),
        })
    } else if pct >= EXCELLENT_ATTENDANCE_FROM {
        Some(Insight {
            severity: Severity::Success,
            text: format!("Excellent attendance at {pct:.0}%."),
        })
    } else {
        None
    }
}

fn workflow_rule(assignments: &AssignmentProgress) -> Option<Insight> {
    if assignments.pending > 0 {
        let noun = if assignments.pending == 1 { "assignment" } else { "assignments" };
        Some(Insight {
            severity: Severity::Warning,
            text: format!("{} {noun} still pending.", assignments.pending),
        })
    } else if assignments.completed > 0 {
        Some(Insight {
            severity: Severity::Success,
            text: "All assignments are submitted.".to_string(),
        })
    } else {
        None
    }
}

/// Fires the performance, attendance and workflow rules in that order and keeps the
/// two most severe, rule order breaking ties. Output is most severe first.
pub fn generate(
    marks: &MarksSummary,
    attendance: &AttendanceSummary,
    assignments: &AssignmentProgress,
) -> Vec<Insight> {
    let mut fired: Vec<Insight> = [
        performance_rule(marks),
        attendance_rule(attendance),
        workflow_rule(assignments),
    ]
    .into_iter()
    .flatten()
    .collect();

    // Stable sort keeps declaration order among equal severities.
    fired.sort_by(|a, b| b.severity.cmp(&a.severity));
    fired.truncate(MAX_INSIGHTS);
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(overall: f64, graded: usize) -> MarksSummary {
        MarksSummary {
            total_obtained: overall,
            total_max: 100.0,
            overall_percentage: overall,
            graded_count: graded,
            subjects: Vec::new(),
        }
    }

    fn attendance(percentage: f64, total: usize) -> AttendanceSummary {
        AttendanceSummary {
            present: 0,
            absent: 0,
            leave: 0,
            total,
            percentage,
            trend: Vec::new(),
        }
    }

    fn assignments(completed: usize, pending: usize) -> AssignmentProgress {
        AssignmentProgress {
            completed,
            pending,
            ratio: 0.0,
        }
    }

    fn severities(insights: &[Insight]) -> Vec<Severity> {
        insights.iter().map(|i| i.severity).collect()
    }

    #[test]
    fn three_rules_firing_keeps_the_two_most_severe() {
        let out = generate(&marks(92.0, 4), &attendance(60.0, 20), &assignments(1, 3));
        assert_eq!(severities(&out), vec![Severity::Danger, Severity::Warning]);
        assert!(out[0].text.contains("below the 75% threshold"));
        assert!(out[1].text.contains("3 assignments"));
    }

    #[test]
    fn ties_fall_back_to_rule_order() {
        let out = generate(&marks(90.0, 4), &attendance(95.0, 20), &assignments(5, 0));
        assert_eq!(out.len(), 2);
        assert_eq!(severities(&out), vec![Severity::Success, Severity::Success]);
        assert!(out[0].text.contains("academic performance"));
        assert!(out[1].text.contains("attendance"));
    }

    #[test]
    fn info_is_dropped_first() {
        let out = generate(&marks(70.0, 4), &attendance(92.0, 20), &assignments(0, 1));
        assert_eq!(severities(&out), vec![Severity::Warning, Severity::Success]);
    }

    #[test]
    fn performance_bands() {
        let low = generate(&marks(59.9, 1), &attendance(0.0, 0), &assignments(0, 0));
        assert_eq!(severities(&low), vec![Severity::Warning]);
        let mid = generate(&marks(60.0, 1), &attendance(0.0, 0), &assignments(0, 0));
        assert_eq!(severities(&mid), vec![Severity::Info]);
        let high = generate(&marks(85.0, 1), &attendance(0.0, 0), &assignments(0, 0));
        assert_eq!(severities(&high), vec![Severity::Success]);
    }

    #[test]
    fn middling_attendance_and_no_data_stay_quiet() {
        assert!(generate(&marks(0.0, 0), &attendance(80.0, 10), &assignments(0, 0)).is_empty());
        assert!(generate(&marks(0.0, 0), &attendance(0.0, 0), &assignments(0, 0)).is_empty());
    }

    #[test]
    fn never_more_than_two() {
        for avg in [10.0, 65.0, 88.0] {
            for att in [50.0, 80.0, 95.0] {
                for pending in [0, 2] {
                    let out = generate(&marks(avg, 3), &attendance(att, 10), &assignments(1, pending));
                    assert!(out.len() <= MAX_INSIGHTS);
                }
            }
        }
    }
}
