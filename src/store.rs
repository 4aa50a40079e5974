use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AssignmentTask, AttendanceRecord, MarkRecord, NoticeItem, Role, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Student(i64),
    Cohort,
}

impl Scope {
    pub fn includes(&self, student_id: i64) -> bool {
        match self {
            Scope::Student(id) => *id == student_id,
            Scope::Cohort => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBundle {
    pub tasks: Vec<AssignmentTask>,
    pub submissions: Vec<Submission>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_attendance(&self, scope: Scope) -> Result<Vec<AttendanceRecord>>;
    async fn fetch_marks(&self, scope: Scope) -> Result<Vec<MarkRecord>>;
    async fn fetch_tasks_and_submissions(&self, scope: Scope) -> Result<TaskBundle>;
    async fn fetch_notices(&self, role: Role) -> Result<Vec<NoticeItem>>;
}

/// Fixed snapshot, used by tests and offline tooling.
#[derive(Debug, Clone, Default)]
pub struct StaticRecordStore {
    pub attendance: Vec<AttendanceRecord>,
    pub marks: Vec<MarkRecord>,
    pub tasks: Vec<AssignmentTask>,
    pub submissions: Vec<Submission>,
    pub notices: Vec<NoticeItem>,
}

#[async_trait]
impl RecordStore for StaticRecordStore {
    async fn fetch_attendance(&self, scope: Scope) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .attendance
            .iter()
            .filter(|r| scope.includes(r.student_id))
            .cloned()
            .collect())
    }

    async fn fetch_marks(&self, scope: Scope) -> Result<Vec<MarkRecord>> {
        Ok(self
            .marks
            .iter()
            .filter(|m| scope.includes(m.student_id))
            .cloned()
            .collect())
    }

    async fn fetch_tasks_and_submissions(&self, scope: Scope) -> Result<TaskBundle> {
        Ok(TaskBundle {
            tasks: self.tasks.clone(),
            submissions: self
                .submissions
                .iter()
                .filter(|s| scope.includes(s.student_id))
                .cloned()
                .collect(),
        })
    }

    async fn fetch_notices(&self, role: Role) -> Result<Vec<NoticeItem>> {
        Ok(self
            .notices
            .iter()
            .filter(|n| n.recipient_role.admits(role))
            .cloned()
            .collect())
    }
}
