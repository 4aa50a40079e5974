use std::collections::HashMap;

use chrono::Datelike;

use crate::models::{AttendanceRecord, AttendanceStanding, AttendanceStatus, AttendanceSummary, TrendPoint};

pub const LOW_ATTENDANCE_BELOW: f64 = 75.0;
pub const EXCELLENT_ATTENDANCE_FROM: f64 = 90.0;

pub fn summarize(records: &[AttendanceRecord]) -> AttendanceSummary {
    let mut present = 0usize;
    let mut absent = 0usize;
    let mut leave = 0usize;

    for record in records {
        match record.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
            AttendanceStatus::Leave => leave += 1,
        }
    }

    let total = records.len();
    AttendanceSummary {
        present,
        absent,
        leave,
        total,
        percentage: whole_percent(present, total),
        trend: monthly_trend(records),
    }
}

/// Month buckets in chronological order of first appearance. Months in different
/// years are separate buckets.
pub fn monthly_trend(records: &[AttendanceRecord]) -> Vec<TrendPoint> {
    let mut sorted: Vec<&AttendanceRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);

    let mut order: Vec<(i32, u32)> = Vec::new();
    let mut buckets: HashMap<(i32, u32), (usize, usize, String)> = HashMap::new();

    for record in sorted {
        let key = (record.date.year(), record.date.month());
        let entry = buckets.entry(key).or_insert_with(|| {
            order.push(key);
            (0, 0, record.date.format("%b %Y").to_string())
        });
        if record.status == AttendanceStatus::Present {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    order
        .into_iter()
        .filter_map(|key| buckets.remove(&key))
        .map(|(present, total, bucket)| TrendPoint {
            bucket,
            percentage: whole_percent(present, total),
        })
        .collect()
}

pub fn standing(percentage: f64) -> AttendanceStanding {
    if percentage < LOW_ATTENDANCE_BELOW {
        AttendanceStanding::Low
    } else if percentage >= EXCELLENT_ATTENDANCE_FROM {
        AttendanceStanding::Excellent
    } else {
        AttendanceStanding::Normal
    }
}

fn whole_percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 100.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: i64, date: (i32, u32, u32), status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id,
            student_id: 7,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid date"),
            status,
        }
    }

    #[test]
    fn three_of_four_present_is_exactly_on_the_threshold() {
        use AttendanceStatus::*;
        let records = vec![
            record(1, (2026, 1, 5), Present),
            record(2, (2026, 1, 6), Present),
            record(3, (2026, 1, 7), Absent),
            record(4, (2026, 1, 8), Present),
        ];

        let summary = summarize(&records);
        assert_eq!(summary.present, 3);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.percentage, 75.0);
        assert_eq!(standing(summary.percentage), AttendanceStanding::Normal);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.present, 0);
        assert_eq!(summary.percentage, 0.0);
        assert!(summary.trend.is_empty());
    }

    #[test]
    fn leave_counts_against_the_percentage() {
        use AttendanceStatus::*;
        let records = vec![
            record(1, (2026, 2, 2), Present),
            record(2, (2026, 2, 3), Leave),
            record(3, (2026, 2, 4), Absent),
        ];

        let summary = summarize(&records);
        assert_eq!(summary.leave, 1);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.percentage, 33.0);
    }

    #[test]
    fn trend_follows_dates_not_input_order_or_alphabet() {
        use AttendanceStatus::*;
        // "Mar" sorts before "Jan" alphabetically; chronology must win.
        let records = vec![
            record(1, (2026, 3, 2), Absent),
            record(2, (2026, 1, 12), Present),
            record(3, (2025, 12, 1), Present),
            record(4, (2026, 1, 13), Absent),
            record(5, (2026, 3, 3), Present),
        ];

        let trend = monthly_trend(&records);
        let buckets: Vec<&str> = trend.iter().map(|p| p.bucket.as_str()).collect();
        assert_eq!(buckets, vec!["Dec 2025", "Jan 2026", "Mar 2026"]);
        assert_eq!(trend[0].percentage, 100.0);
        assert_eq!(trend[1].percentage, 50.0);
        assert_eq!(trend[2].percentage, 50.0);
    }

    #[test]
    fn same_month_in_different_years_stays_separate() {
        use AttendanceStatus::*;
        let records = vec![
            record(1, (2025, 1, 10), Present),
            record(2, (2026, 1, 10), Absent),
        ];

        let trend = monthly_trend(&records);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].bucket, "Jan 2025");
        assert_eq!(trend[1].percentage, 0.0);
    }

    #[test]
    fn standing_boundaries_are_inclusive() {
        assert_eq!(standing(74.0), AttendanceStanding::Low);
        assert_eq!(standing(75.0), AttendanceStanding::Normal);
        assert_eq!(standing(89.0), AttendanceStanding::Normal);
        assert_eq!(standing(90.0), AttendanceStanding::Excellent);
        assert_eq!(standing(0.0), AttendanceStanding::Low);
    }

    #[test]
    fn percentage_stays_within_bounds() {
        use AttendanceStatus::*;
        let statuses = [Present, Absent, Leave];
        for n in 1..30usize {
            let records: Vec<AttendanceRecord> = (0..n)
                .map(|i| record(i as i64, (2026, 1 + (i % 12) as u32, 1), statuses[i * 7 % 3]))
                .collect();
            let summary = summarize(&records);
            assert!((0.0..=100.0).contains(&summary.percentage));
            for point in &summary.trend {
                assert!((0.0..=100.0).contains(&point.percentage));
            }
        }
    }
}
