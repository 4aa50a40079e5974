use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl AttendanceStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "leave" => Some(Self::Leave),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
            Self::Leave => "Leave",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// A mark sitting. `marks_obtained == None` is an absent or ungraded sitting,
/// never a zero score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkRecord {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub exam_type: String,
    pub marks_obtained: Option<f64>,
    pub max_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentTask {
    pub id: i64,
    pub subject: String,
    pub title: String,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Submitted,
    Graded,
}

impl SubmissionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "SUBMITTED" => Some(Self::Submitted),
            "GRADED" => Some(Self::Graded),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Submitted | Self::Graded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: i64,
    pub task_id: i64,
    pub student_id: i64,
    pub status: SubmissionStatus,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticePriority {
    Normal,
    High,
    Urgent,
}

impl NoticePriority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NORMAL" | "LOW" | "MEDIUM" => Some(Self::Normal),
            "HIGH" => Some(Self::High),
            "URGENT" => Some(Self::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_uppercase();
        match value.strip_prefix("ROLE_").unwrap_or(value.as_str()) {
            "STUDENT" => Some(Self::Student),
            "STAFF" => Some(Self::Staff),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Highest role among a user's granted authorities: Admin, then Staff, then Student.
    pub fn from_authorities<S: AsRef<str>>(authorities: &[S]) -> Option<Self> {
        let granted: Vec<Role> = authorities
            .iter()
            .filter_map(|a| Role::parse(a.as_ref()))
            .collect();
        [Role::Admin, Role::Staff, Role::Student]
            .into_iter()
            .find(|role| granted.contains(role))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Staff => "STAFF",
            Self::Admin => "ADMIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientRole {
    All,
    Only(Role),
}

impl RecipientRole {
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        Role::parse(value).map(Self::Only)
    }

    pub fn admits(&self, role: Role) -> bool {
        match self {
            Self::All => true,
            Self::Only(target) => *target == role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticeItem {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub priority: NoticePriority,
    pub recipient_role: RecipientRole,
    pub active: bool,
}

// Rows as they arrive from the record store or a CSV import. Every field the
// engine relies on is optional here so a bad row can be rejected on its own.

#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct RawAttendanceRow {
    pub id: i64,
    pub student_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl TryFrom<RawAttendanceRow> for AttendanceRecord {
    type Error = Error;

    fn try_from(row: RawAttendanceRow) -> Result<Self> {
        let student_id = row
            .student_id
            .ok_or_else(|| Error::malformed("attendance", row.id, "missing studentId"))?;
        let date = row
            .date
            .ok_or_else(|| Error::malformed("attendance", row.id, "missing date"))?;
        let raw_status = row.status.unwrap_or_default();
        let status = AttendanceStatus::parse(&raw_status).ok_or_else(|| {
            Error::malformed("attendance", row.id, format!("unknown status {raw_status:?}"))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            student_id,
            date,
            status,
        })
    }
}

#[derive(Debug, Clone, Deserialize, sqlx::FromRow)]
pub struct RawMarkRow {
    pub id: i64,
    pub student_id: Option<i64>,
    pub subject: Option<String>,
    pub exam_type: Option<String>,
    pub marks_obtained: Option<f64>,
    pub max_marks: Option<f64>,
}

impl TryFrom<RawMarkRow> for MarkRecord {
    type Error = Error;

    fn try_from(row: RawMarkRow) -> Result<Self> {
        let student_id = row
            .student_id
            .ok_or_else(|| Error::malformed("mark", row.id, "missing studentId"))?;
        let subject = row
            .subject
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::malformed("mark", row.id, "missing subject"))?;
        let max_marks = match row.max_marks {
            Some(value) if value >= 0.0 && value.is_finite() => value,
            Some(value) => {
                return Err(Error::malformed("mark", row.id, format!("invalid maxMarks {value}")))
            }
            None => return Err(Error::malformed("mark", row.id, "missing maxMarks")),
        };
        if let Some(obtained) = row.marks_obtained {
            if obtained < 0.0 || !obtained.is_finite() {
                return Err(Error::malformed(
                    "mark",
                    row.id,
                    format!("invalid marksObtained {obtained}"),
                ));
            }
        }

        Ok(MarkRecord {
            id: row.id,
            student_id,
            subject,
            exam_type: row.exam_type.unwrap_or_default(),
            marks_obtained: row.marks_obtained,
            max_marks,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawTaskRow {
    pub id: i64,
    pub subject: Option<String>,
    pub title: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

impl TryFrom<RawTaskRow> for AssignmentTask {
    type Error = Error;

    fn try_from(row: RawTaskRow) -> Result<Self> {
        let deadline = row
            .deadline
            .ok_or_else(|| Error::malformed("task", row.id, "missing deadline"))?;

        Ok(AssignmentTask {
            id: row.id,
            subject: row.subject.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            deadline,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawSubmissionRow {
    pub id: i64,
    pub task_id: Option<i64>,
    pub student_id: Option<i64>,
    pub status: Option<String>,
    pub grade: Option<String>,
}

impl TryFrom<RawSubmissionRow> for Submission {
    type Error = Error;

    fn try_from(row: RawSubmissionRow) -> Result<Self> {
        let task_id = row
            .task_id
            .ok_or_else(|| Error::malformed("submission", row.id, "missing taskId"))?;
        let student_id = row
            .student_id
            .ok_or_else(|| Error::malformed("submission", row.id, "missing studentId"))?;
        let raw_status = row.status.unwrap_or_else(|| "PENDING".to_string());
        let status = SubmissionStatus::parse(&raw_status).ok_or_else(|| {
            Error::malformed("submission", row.id, format!("unknown status {raw_status:?}"))
        })?;

        Ok(Submission {
            id: row.id,
            task_id,
            student_id,
            status,
            grade: row.grade.filter(|g| !g.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawNoticeRow {
    pub id: i64,
    pub title: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub recipient_role: Option<String>,
    pub active: Option<bool>,
}

impl TryFrom<RawNoticeRow> for NoticeItem {
    type Error = Error;

    fn try_from(row: RawNoticeRow) -> Result<Self> {
        let timestamp = row
            .timestamp
            .ok_or_else(|| Error::malformed("notice", row.id, "missing timestamp"))?;
        let raw_role = row.recipient_role.unwrap_or_else(|| "ALL".to_string());
        let recipient_role = RecipientRole::parse(&raw_role).ok_or_else(|| {
            Error::malformed("notice", row.id, format!("unknown recipientRole {raw_role:?}"))
        })?;
        let priority = row
            .priority
            .as_deref()
            .map(|p| {
                NoticePriority::parse(p).ok_or_else(|| {
                    Error::malformed("notice", row.id, format!("unknown priority {p:?}"))
                })
            })
            .transpose()?
            .unwrap_or(NoticePriority::Normal);

        Ok(NoticeItem {
            id: row.id,
            title: row.title.unwrap_or_default(),
            message: row.message.unwrap_or_default(),
            timestamp,
            category: row.category.unwrap_or_else(|| "NOTICE".to_string()),
            priority,
            recipient_role,
            active: row.active.unwrap_or(true),
        })
    }
}

/// Converts raw rows, dropping (and logging) the ones that fail validation so one
/// bad record never blanks out the whole collection.
pub fn accept_valid<R, T>(rows: Vec<R>) -> Vec<T>
where
    T: TryFrom<R, Error = Error>,
{
    let mut accepted = Vec::with_capacity(rows.len());
    for row in rows {
        match T::try_from(row) {
            Ok(record) => accepted.push(record),
            Err(err) => tracing::warn!("skipping record: {err}"),
        }
    }
    accepted
}

// Derived metrics. None of these are persisted.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub bucket: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceStanding {
    Low,
    Normal,
    Excellent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub leave: usize,
    pub total: usize,
    pub percentage: f64,
    pub trend: Vec<TrendPoint>,
}

/// Serialized as `{ "label", "colorClass" }`, see `marks.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    /// Absent or ungraded sitting
    Absent,
    F,
    D,
    C,
    B,
    A,
    APlus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    Weak,
    Fair,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SittingScore {
    pub exam_type: String,
    pub obtained: Option<f64>,
    pub max: f64,
    pub percentage: Option<f64>,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRollup {
    pub subject: String,
    pub graded_count: usize,
    pub absent_count: usize,
    pub average_obtained: f64,
    pub average_max: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub band: PerformanceBand,
    pub sittings: Vec<SittingScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarksSummary {
    pub total_obtained: f64,
    pub total_max: f64,
    pub overall_percentage: f64,
    pub graded_count: usize,
    pub subjects: Vec<SubjectRollup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStanding {
    pub student_id: i64,
    pub percentage: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AssignmentProgress {
    pub completed: usize,
    pub pending: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectGradeStats {
    pub subject: String,
    pub average_grade_point: f64,
    pub submission_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub severity: Severity,
    pub text: String,
}
