use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{
    accept_valid, AttendanceRecord, MarkRecord, NoticeItem, RawAttendanceRow, RawMarkRow,
    RawNoticeRow, RawSubmissionRow, RawTaskRow, Role,
};
use crate::notifications::{WatermarkKey, WatermarkStore};
use crate::store::{RecordStore, Scope, TaskBundle};

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> Result<()> {
    let today = Utc::now().date_naive();
    let statuses = ["Present", "Present", "Absent", "Present", "Leave", "Present"];

    let mut attendance_id = 1000i64;
    for student_id in [1i64, 2] {
        for (offset, status) in statuses.iter().enumerate() {
            let date = today - Duration::days(3 * offset as i64 + student_id);
            sqlx::query(
                r#"
                INSERT INTO campus_pulse.attendance (id, student_id, date, status)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(attendance_id)
            .bind(student_id)
            .bind(date)
            .bind(*status)
            .execute(pool)
            .await?;
            attendance_id += 1;
        }
    }

    let marks: [(i64, i64, &str, &str, Option<f64>, f64); 5] = [
        (1000, 1, "Mathematics", "Midterm", Some(42.0), 50.0),
        (1001, 1, "Mathematics", "Final", Some(48.0), 50.0),
        (1002, 1, "Physics", "Midterm", None, 50.0),
        (1003, 2, "Mathematics", "Midterm", Some(21.0), 50.0),
        (1004, 2, "Physics", "Midterm", Some(33.0), 50.0),
    ];
    for (id, student_id, subject, exam_type, obtained, max) in marks {
        sqlx::query(
            r#"
            INSERT INTO campus_pulse.marks (id, student_id, subject, exam_type, marks_obtained, max_marks)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(student_id)
        .bind(subject)
        .bind(exam_type)
        .bind(obtained)
        .bind(max)
        .execute(pool)
        .await?;
    }

    let tasks = [
        (1000i64, "Mathematics", "Problem set 4", Utc::now() + Duration::days(3)),
        (1001, "Physics", "Lab report", Utc::now() + Duration::days(6)),
        (1002, "Mathematics", "Reading quiz", Utc::now() - Duration::days(2)),
    ];
    for (id, subject, title, deadline) in tasks {
        sqlx::query(
            r#"
            INSERT INTO campus_pulse.assignment_tasks (id, subject, title, deadline)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(subject)
        .bind(title)
        .bind(deadline)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO campus_pulse.submissions (id, task_id, student_id, status, grade)
        VALUES (1000, 1002, 1, 'GRADED', 'A'), (1001, 1000, 2, 'SUBMITTED', NULL)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .execute(pool)
    .await?;

    let notices = [
        (1000i64, "Mid-semester exams", "Timetable is on the notice board", "EXAM", "HIGH", "ALL", 1),
        (1001, "Staff meeting", "Friday 3pm in the seminar hall", "NOTICE", "NORMAL", "STAFF", 3),
        (1002, "Library hours", "Open until 9pm during exams", "ANNOUNCEMENT", "NORMAL", "STUDENT", 10),
    ];
    for (id, title, message, category, priority, role, days_ago) in notices {
        sqlx::query(
            r#"
            INSERT INTO campus_pulse.notices
            (id, title, message, timestamp, category, priority, recipient_role, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(message)
        .bind(Utc::now() - Duration::days(days_ago))
        .bind(category)
        .bind(priority)
        .bind(role)
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Attendance,
    Marks,
}

/// Rows that cannot be decoded or fail validation are logged and skipped.
pub fn read_csv_records<R, Raw, T>(reader: &mut csv::Reader<R>) -> Vec<T>
where
    R: io::Read,
    Raw: DeserializeOwned,
    T: TryFrom<Raw, Error = Error>,
{
    let mut rows = Vec::new();
    for row in reader.deserialize::<Raw>() {
        match row {
            Ok(row) => rows.push(row),
            Err(err) => warn!("skipping unreadable CSV row: {err}"),
        }
    }
    accept_valid(rows)
}

/// Loads rows from a CSV file. Rows whose id already exists are left untouched.
pub async fn import_csv(pool: &PgPool, kind: ImportKind, csv_path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    match kind {
        ImportKind::Attendance => {
            let records: Vec<AttendanceRecord> =
                read_csv_records::<_, RawAttendanceRow, _>(&mut reader);
            for record in records {
                let result = sqlx::query(
                    r#"
                    INSERT INTO campus_pulse.attendance (id, student_id, date, status)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(record.id)
                .bind(record.student_id)
                .bind(record.date)
                .bind(record.status.as_str())
                .execute(pool)
                .await?;
                inserted += result.rows_affected() as usize;
            }
        }
        ImportKind::Marks => {
            let records: Vec<MarkRecord> = read_csv_records::<_, RawMarkRow, _>(&mut reader);
            for record in records {
                let result = sqlx::query(
                    r#"
                    INSERT INTO campus_pulse.marks
                    (id, student_id, subject, exam_type, marks_obtained, max_marks)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(record.id)
                .bind(record.student_id)
                .bind(&record.subject)
                .bind(&record.exam_type)
                .bind(record.marks_obtained)
                .bind(record.max_marks)
                .execute(pool)
                .await?;
                inserted += result.rows_affected() as usize;
            }
        }
    }

    Ok(inserted)
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attendance dates from `since` onwards, for report windows.
    pub async fn fetch_attendance_since(
        &self,
        scope: Scope,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let records = self.fetch_attendance(scope).await?;
        Ok(records.into_iter().filter(|r| r.date >= since).collect())
    }
}

/// Role filtering happens after conversion so legacy `ROLE_`-prefixed and missing
/// recipient roles are read the same way everywhere.
fn notices_for(rows: Vec<RawNoticeRow>, role: Role) -> Vec<NoticeItem> {
    accept_valid::<RawNoticeRow, NoticeItem>(rows)
        .into_iter()
        .filter(|n| n.recipient_role.admits(role))
        .collect()
}

fn student_filter(scope: Scope) -> Option<i64> {
    match scope {
        Scope::Student(id) => Some(id),
        Scope::Cohort => None,
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_attendance(&self, scope: Scope) -> Result<Vec<AttendanceRecord>> {
        let rows: Vec<RawAttendanceRow> = sqlx::query_as(
            "SELECT id, student_id, date, status \
             FROM campus_pulse.attendance \
             WHERE ($1::BIGINT IS NULL OR student_id = $1) \
             ORDER BY date",
        )
        .bind(student_filter(scope))
        .fetch_all(&self.pool)
        .await?;
        Ok(accept_valid(rows))
    }

    async fn fetch_marks(&self, scope: Scope) -> Result<Vec<MarkRecord>> {
        let rows: Vec<RawMarkRow> = sqlx::query_as(
            "SELECT id, student_id, subject, exam_type, marks_obtained, max_marks \
             FROM campus_pulse.marks \
             WHERE ($1::BIGINT IS NULL OR student_id = $1) \
             ORDER BY id",
        )
        .bind(student_filter(scope))
        .fetch_all(&self.pool)
        .await?;
        Ok(accept_valid(rows))
    }

    async fn fetch_tasks_and_submissions(&self, scope: Scope) -> Result<TaskBundle> {
        let tasks: Vec<RawTaskRow> = sqlx::query_as(
            "SELECT id, subject, title, deadline \
             FROM campus_pulse.assignment_tasks \
             ORDER BY deadline",
        )
        .fetch_all(&self.pool)
        .await?;

        let submissions: Vec<RawSubmissionRow> = sqlx::query_as(
            "SELECT id, task_id, student_id, status, grade \
             FROM campus_pulse.submissions \
             WHERE ($1::BIGINT IS NULL OR student_id = $1) \
             ORDER BY id",
        )
        .bind(student_filter(scope))
        .fetch_all(&self.pool)
        .await?;

        Ok(TaskBundle {
            tasks: accept_valid(tasks),
            submissions: accept_valid(submissions),
        })
    }

    async fn fetch_notices(&self, role: Role) -> Result<Vec<NoticeItem>> {
        let rows: Vec<RawNoticeRow> = sqlx::query_as(
            "SELECT id, title, message, timestamp, category, priority, recipient_role, active \
             FROM campus_pulse.notices \
             ORDER BY timestamp DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(notices_for(rows, role))
    }
}

/// Watermark slots in a small key-value table.
pub struct PgWatermarkStore {
    pool: PgPool,
}

impl PgWatermarkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    async fn read(&self, key: &WatermarkKey) -> Result<Option<DateTime<Utc>>> {
        let value = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT value FROM campus_pulse.watermarks WHERE key = $1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn write(&self, key: &WatermarkKey, value: DateTime<Utc>) -> Result<()> {
        // GREATEST keeps concurrent writers from pulling the slot backwards.
        sqlx::query(
            r#"
            INSERT INTO campus_pulse.watermarks (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE
            SET value = GREATEST(campus_pulse.watermarks.value, EXCLUDED.value)
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, RecipientRole};

    #[test]
    fn bad_csv_rows_are_skipped_without_losing_the_rest() {
        let data = "id,student_id,date,status\n\
                    1,2,2026-01-05,Present\n\
                    2,2,2026-13-01,Present\n\
                    3,2,2026-01-07,Absent\n\
                    x,2,2026-01-08,Present\n\
                    5,2,2026-01-09,Sick\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());

        let records: Vec<AttendanceRecord> =
            read_csv_records::<_, RawAttendanceRow, _>(&mut reader);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(records[1].status, AttendanceStatus::Absent);
    }

    #[test]
    fn non_numeric_marks_skip_only_that_row() {
        let data = "id,student_id,subject,exam_type,marks_obtained,max_marks\n\
                    1,4,Math,Midterm,41,50\n\
                    2,4,Math,Final,forty,50\n\
                    3,4,Physics,Midterm,,50\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());

        let records: Vec<MarkRecord> = read_csv_records::<_, RawMarkRow, _>(&mut reader);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].marks_obtained, Some(41.0));
        assert_eq!(records[1].marks_obtained, None);
    }

    fn raw_notice(id: i64, recipient_role: Option<&str>) -> RawNoticeRow {
        RawNoticeRow {
            id,
            title: Some(format!("Notice {id}")),
            message: None,
            timestamp: Some(Utc::now()),
            category: None,
            priority: None,
            recipient_role: recipient_role.map(str::to_string),
            active: Some(true),
        }
    }

    #[test]
    fn notice_roles_match_row_conversion() {
        let rows = vec![
            raw_notice(1, None),
            raw_notice(2, Some("ROLE_STUDENT")),
            raw_notice(3, Some("staff")),
            raw_notice(4, Some("all")),
            raw_notice(5, Some("ROLE_ADMIN")),
        ];

        let ids = |role| notices_for(rows.clone(), role).iter().map(|n| n.id).collect::<Vec<_>>();
        assert_eq!(ids(Role::Student), vec![1, 2, 4]);
        assert_eq!(ids(Role::Staff), vec![1, 3, 4]);
        assert_eq!(ids(Role::Admin), vec![1, 4, 5]);

        let first = notices_for(rows.clone(), Role::Student);
        assert_eq!(first[0].recipient_role, RecipientRole::All);
    }
}
