use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{
    AssignmentProgress, AttendanceSummary, Insight, MarksSummary, NoticeItem, Role,
};
use crate::notifications::{self, FreshnessTracker};
use crate::store::{RecordStore, Scope, TaskBundle};
use crate::{assignments, attendance, insights, marks};

pub const RECENT_NOTICE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub scope: Scope,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub attendance: AttendanceSummary,
    pub marks: MarksSummary,
    pub assignments: AssignmentProgress,
    pub insights: Vec<Insight>,
    /// At least one fetch failed and was replaced by an empty collection.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticeSnapshot {
    pub unread: usize,
    pub badge: Option<String>,
    pub recent: Vec<NoticeItem>,
    pub degraded: bool,
}

fn or_empty<T: Default>(what: &str, result: Result<T>, degraded: &mut bool) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("{what} fetch failed, showing no data: {err}");
            *degraded = true;
            T::default()
        }
    }
}

pub async fn refresh_attendance(store: &dyn RecordStore, scope: Scope) -> (AttendanceSummary, bool) {
    let mut degraded = false;
    let rows = or_empty("attendance", store.fetch_attendance(scope).await, &mut degraded);
    (attendance::summarize(&rows), degraded)
}

pub async fn refresh_dashboard(store: &dyn RecordStore, viewer: Viewer) -> DashboardSnapshot {
    let mut degraded = false;

    let (attendance_rows, mark_rows, bundle) = tokio::join!(
        store.fetch_attendance(viewer.scope),
        store.fetch_marks(viewer.scope),
        store.fetch_tasks_and_submissions(viewer.scope),
    );
    let attendance_rows = or_empty("attendance", attendance_rows, &mut degraded);
    let mark_rows = or_empty("marks", mark_rows, &mut degraded);
    let bundle: TaskBundle = or_empty("assignments", bundle, &mut degraded);

    let attendance = attendance::summarize(&attendance_rows);
    let marks = marks::summarize(&mark_rows);
    let assignments = match viewer.scope {
        Scope::Student(student_id) => {
            assignments::progress(&bundle.tasks, &bundle.submissions, student_id)
        }
        Scope::Cohort => AssignmentProgress::default(),
    };
    let insights = insights::generate(&marks, &attendance, &assignments);

    debug!(
        attendance = attendance.total,
        marks = mark_rows.len(),
        tasks = bundle.tasks.len(),
        degraded,
        "dashboard recomputed"
    );

    DashboardSnapshot {
        attendance,
        marks,
        assignments,
        insights,
        degraded,
    }
}

pub async fn refresh_notices(
    store: &dyn RecordStore,
    tracker: &FreshnessTracker,
    role: Role,
) -> NoticeSnapshot {
    let mut degraded = false;
    let notices = or_empty("notices", store.fetch_notices(role).await, &mut degraded);

    let unread = match tracker.unread_count(&notices, role).await {
        Ok(count) => count,
        Err(err) => {
            warn!("watermark unavailable, treating all notices as seen: {err}");
            degraded = true;
            0
        }
    };

    NoticeSnapshot {
        unread,
        badge: notifications::badge_label(unread),
        recent: notifications::recent(&notices, role, RECENT_NOTICE_LIMIT),
        degraded,
    }
}

pub async fn open_notice_panel(
    store: &dyn RecordStore,
    tracker: &FreshnessTracker,
    role: Role,
) -> Result<NoticeSnapshot> {
    tracker.mark_seen().await?;
    Ok(refresh_notices(store, tracker, role).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, Utc};

    use crate::error::Error;
    use crate::models::{
        AssignmentTask, AttendanceRecord, AttendanceStatus, MarkRecord, RecipientRole, Severity,
        Submission, SubmissionStatus,
    };
    use crate::notifications::tests::notice;
    use crate::notifications::{InMemoryWatermarkStore, WatermarkKey};
    use crate::store::StaticRecordStore;

    struct OfflineStore;

    fn offline() -> Error {
        Error::Transport(sqlx::Error::PoolTimedOut)
    }

    #[async_trait]
    impl RecordStore for OfflineStore {
        async fn fetch_attendance(&self, _: Scope) -> Result<Vec<AttendanceRecord>> {
            Err(offline())
        }
        async fn fetch_marks(&self, _: Scope) -> Result<Vec<MarkRecord>> {
            Err(offline())
        }
        async fn fetch_tasks_and_submissions(&self, _: Scope) -> Result<TaskBundle> {
            Err(offline())
        }
        async fn fetch_notices(&self, _: Role) -> Result<Vec<NoticeItem>> {
            Err(offline())
        }
    }

    fn sample_store() -> StaticRecordStore {
        let day = |d: u32| NaiveDate::from_ymd_opt(2026, 2, d).expect("valid date");
        let statuses = [
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Absent,
            AttendanceStatus::Present,
        ];
        StaticRecordStore {
            attendance: statuses
                .iter()
                .enumerate()
                .map(|(i, status)| AttendanceRecord {
                    id: i as i64,
                    student_id: 1,
                    date: day(i as u32 + 2),
                    status: *status,
                })
                .collect(),
            marks: vec![
                MarkRecord {
                    id: 1,
                    student_id: 1,
                    subject: "Math".to_string(),
                    exam_type: "Midterm".to_string(),
                    marks_obtained: Some(45.0),
                    max_marks: 50.0,
                },
                MarkRecord {
                    id: 2,
                    student_id: 2,
                    subject: "Math".to_string(),
                    exam_type: "Midterm".to_string(),
                    marks_obtained: Some(10.0),
                    max_marks: 50.0,
                },
            ],
            tasks: vec![AssignmentTask {
                id: 1,
                subject: "Math".to_string(),
                title: "Worksheet".to_string(),
                deadline: Utc::now() + Duration::days(2),
            }],
            submissions: vec![Submission {
                id: 1,
                task_id: 1,
                student_id: 2,
                status: SubmissionStatus::Submitted,
                grade: None,
            }],
            notices: vec![
                notice(1, Utc::now() - Duration::hours(1), RecipientRole::All),
                notice(2, Utc::now() - Duration::hours(2), RecipientRole::Only(Role::Staff)),
            ],
        }
    }

    #[tokio::test]
    async fn dashboard_composes_every_aggregator() {
        let store = sample_store();
        let viewer = Viewer {
            scope: Scope::Student(1),
            role: Role::Student,
        };

        let snapshot = refresh_dashboard(&store, viewer).await;
        assert!(!snapshot.degraded);
        assert_eq!(snapshot.attendance.percentage, 50.0);
        assert_eq!(snapshot.marks.overall_percentage, 90.0);
        assert_eq!(snapshot.assignments.pending, 1);
        assert_eq!(
            snapshot.insights.iter().map(|i| i.severity).collect::<Vec<_>>(),
            vec![Severity::Danger, Severity::Warning]
        );
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_empty() {
        let viewer = Viewer {
            scope: Scope::Student(1),
            role: Role::Student,
        };
        let snapshot = refresh_dashboard(&OfflineStore, viewer).await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.attendance.total, 0);
        assert_eq!(snapshot.marks.overall_percentage, 0.0);
        assert!(snapshot.insights.is_empty());

        let tracker = FreshnessTracker::new(
            Arc::new(InMemoryWatermarkStore::new()),
            WatermarkKey::installation(),
        );
        let notices = refresh_notices(&OfflineStore, &tracker, Role::Student).await;
        assert!(notices.degraded);
        assert_eq!(notices.unread, 0);
        assert!(notices.recent.is_empty());
    }

    #[tokio::test]
    async fn opening_the_panel_clears_the_badge() {
        let store = sample_store();
        let tracker = FreshnessTracker::new(
            Arc::new(InMemoryWatermarkStore::new()),
            WatermarkKey::for_user("1"),
        );

        let before = refresh_notices(&store, &tracker, Role::Student).await;
        assert_eq!(before.unread, 1);
        assert_eq!(before.badge.as_deref(), Some("1"));

        let after = open_notice_panel(&store, &tracker, Role::Student).await.unwrap();
        assert_eq!(after.unread, 0);
        assert_eq!(after.badge, None);
        assert_eq!(after.recent.len(), 1);
    }
}
