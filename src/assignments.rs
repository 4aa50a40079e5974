use std::collections::HashMap;

use crate::models::{AssignmentProgress, AssignmentTask, Submission, SubjectGradeStats};

/// Completed/pending split for one learner. A task without a submission is pending.
pub fn progress(
    tasks: &[AssignmentTask],
    submissions: &[Submission],
    student_id: i64,
) -> AssignmentProgress {
    let completed_tasks: std::collections::HashSet<i64> = submissions
        .iter()
        .filter(|s| s.student_id == student_id && s.status.is_complete())
        .map(|s| s.task_id)
        .collect();

    let completed = tasks
        .iter()
        .filter(|task| completed_tasks.contains(&task.id))
        .count();
    let pending = tasks.len() - completed;

    AssignmentProgress {
        completed,
        pending,
        ratio: if tasks.is_empty() {
            0.0
        } else {
            completed as f64 / tasks.len() as f64
        },
    }
}

pub fn grade_point(grade: &str) -> f64 {
    match grade.trim().to_ascii_uppercase().as_str() {
        "A" => 4.0,
        "B" => 3.0,
        "C" => 2.0,
        "D" => 1.0,
        _ => 0.0,
    }
}

/// Average grade point per subject across graded submissions, busiest subject first.
pub fn subject_grade_stats(
    tasks: &[AssignmentTask],
    submissions: &[Submission],
) -> Vec<SubjectGradeStats> {
    let subject_of: HashMap<i64, &str> = tasks
        .iter()
        .map(|task| (task.id, task.subject.as_str()))
        .collect();
    let mut map: HashMap<&str, (usize, f64)> = HashMap::new();

    for submission in submissions {
        let (Some(grade), Some(subject)) = (
            submission.grade.as_deref(),
            subject_of.get(&submission.task_id),
        ) else {
            continue;
        };
        let entry = map.entry(*subject).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += grade_point(grade);
    }

    let mut stats: Vec<SubjectGradeStats> = map
        .into_iter()
        .map(|(subject, (count, points))| SubjectGradeStats {
            subject: subject.to_string(),
            average_grade_point: points / count as f64,
            submission_count: count,
        })
        .collect();

    stats.sort_by(|a, b| {
        b.submission_count
            .cmp(&a.submission_count)
            .then_with(|| a.subject.cmp(&b.subject))
    });
    stats
}
