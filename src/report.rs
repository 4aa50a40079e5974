use std::fmt::Write;

use chrono::NaiveDate;

use crate::attendance;
use crate::models::{
    AssignmentProgress, AttendanceStanding, AttendanceSummary, Insight, MarksSummary, NoticeItem,
    SubjectGradeStats,
};

pub struct ReportInput<'a> {
    pub student_label: &'a str,
    pub since: NaiveDate,
    pub attendance: &'a AttendanceSummary,
    pub marks: &'a MarksSummary,
    pub assignments: &'a AssignmentProgress,
    pub grade_stats: &'a [SubjectGradeStats],
    pub unread: usize,
    pub recent_notices: &'a [NoticeItem],
    pub insights: &'a [Insight],
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} (attendance since {})",
        input.student_label, input.since
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highlights");
    if input.insights.is_empty() {
        let _ = writeln!(output, "Nothing to flag for this window.");
    } else {
        for insight in input.insights {
            let _ = writeln!(output, "- [{:?}] {}", insight.severity, insight.text);
        }
    }

    let att = input.attendance;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance");
    if att.total == 0 {
        let _ = writeln!(output, "No attendance recorded for this window.");
    } else {
        let standing = match attendance::standing(att.percentage) {
            AttendanceStanding::Low => " (below threshold)",
            AttendanceStanding::Excellent => " (excellent)",
            AttendanceStanding::Normal => "",
        };
        let _ = writeln!(
            output,
            "{:.0}% present{} across {} days: {} present, {} absent, {} on leave",
            att.percentage, standing, att.total, att.present, att.absent, att.leave
        );
        for point in &att.trend {
            let _ = writeln!(output, "- {}: {:.0}%", point.bucket, point.percentage);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Marks");
    if input.marks.subjects.is_empty() {
        let _ = writeln!(output, "No marks recorded yet.");
    } else {
        let _ = writeln!(
            output,
            "Overall {:.1}% ({}/{})",
            input.marks.overall_percentage, input.marks.total_obtained, input.marks.total_max
        );
        for subject in &input.marks.subjects {
            let _ = writeln!(
                output,
                "- {}: {:.1}% grade {} ({} graded, {} absent)",
                subject.subject,
                subject.percentage,
                subject.grade.label(),
                subject.graded_count,
                subject.absent_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Assignments");
    let progress = input.assignments;
    let _ = writeln!(
        output,
        "{} completed, {} pending ({:.0}% done)",
        progress.completed,
        progress.pending,
        progress.ratio * 100.0
    );
    for stats in input.grade_stats {
        let _ = writeln!(
            output,
            "- {}: average grade point {:.2} over {} submissions",
            stats.subject, stats.average_grade_point, stats.submission_count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Notices");
    let _ = writeln!(output, "{} unread", input.unread);
    for notice in input.recent_notices {
        let _ = writeln!(
            output,
            "- {} ({}) on {}: {}",
            notice.title,
            notice.category,
            notice.timestamp.date_naive(),
            notice.message
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Grade, PerformanceBand, Severity, SubjectRollup, TrendPoint};

    #[test]
    fn report_lists_every_section() {
        let attendance = AttendanceSummary {
            present: 6,
            absent: 3,
            leave: 1,
            total: 10,
            percentage: 60.0,
            trend: vec![TrendPoint {
                bucket: "Feb 2026".to_string(),
                percentage: 60.0,
            }],
        };
        let marks = MarksSummary {
            total_obtained: 90.0,
            total_max: 100.0,
            overall_percentage: 90.0,
            graded_count: 2,
            subjects: vec![SubjectRollup {
                subject: "Math".to_string(),
                graded_count: 2,
                absent_count: 0,
                average_obtained: 45.0,
                average_max: 50.0,
                percentage: 90.0,
                grade: Grade::APlus,
                band: PerformanceBand::Strong,
                sittings: Vec::new(),
            }],
        };
        let assignments = AssignmentProgress {
            completed: 1,
            pending: 2,
            ratio: 1.0 / 3.0,
        };
        let insights = vec![Insight {
            severity: Severity::Danger,
            text: "Attendance is 60%, below the 75% threshold.".to_string(),
        }];

        let report = build_report(&ReportInput {
            student_label: "student 1",
            since: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
            attendance: &attendance,
            marks: &marks,
            assignments: &assignments,
            grade_stats: &[],
            unread: 2,
            recent_notices: &[],
            insights: &insights,
        });

        assert!(report.contains("Generated for student 1 (attendance since 2026-01-01)"));
        assert!(report.contains("- [Danger] Attendance is 60%"));
        assert!(report.contains("60% present (below threshold) across 10 days"));
        assert!(report.contains("- Feb 2026: 60%"));
        assert!(report.contains("- Math: 90.0% grade A+"));
        assert!(report.contains("1 completed, 2 pending (33% done)"));
        assert!(report.contains("2 unread"));
    }

    #[test]
    fn empty_sections_say_so() {
        let report = build_report(&ReportInput {
            student_label: "student 9",
            since: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
            attendance: &AttendanceSummary {
                present: 0,
                absent: 0,
                leave: 0,
                total: 0,
                percentage: 0.0,
                trend: Vec::new(),
            },
            marks: &MarksSummary {
                total_obtained: 0.0,
                total_max: 0.0,
                overall_percentage: 0.0,
                graded_count: 0,
                subjects: Vec::new(),
            },
            assignments: &AssignmentProgress::default(),
            grade_stats: &[],
            unread: 0,
            recent_notices: &[],
            insights: &[],
        });

        assert!(report.contains("Nothing to flag"));
        assert!(report.contains("No attendance recorded"));
        assert!(report.contains("No marks recorded yet."));
    }
}
