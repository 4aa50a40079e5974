use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::error::Result;
use crate::models::{NoticeItem, Role};

/// Legacy installation-wide slot name, used when no identity is known.
pub const INSTALLATION_SLOT: &str = "lastSeenAnnouncement";

pub const DEFAULT_BACKLOG_DAYS: i64 = 7;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatermarkKey(String);

impl WatermarkKey {
    pub fn for_user(user_id: &str) -> Self {
        Self(format!("{INSTALLATION_SLOT}:{user_id}"))
    }

    pub fn installation() -> Self {
        Self(INSTALLATION_SLOT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn read(&self, key: &WatermarkKey) -> Result<Option<DateTime<Utc>>>;
    async fn write(&self, key: &WatermarkKey, value: DateTime<Utc>) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryWatermarkStore {
    slots: Mutex<HashMap<WatermarkKey, DateTime<Utc>>>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn read(&self, key: &WatermarkKey) -> Result<Option<DateTime<Utc>>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(key).copied())
    }

    async fn write(&self, key: &WatermarkKey, value: DateTime<Utc>) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(key.clone(), value);
        Ok(())
    }
}

pub fn visible_to(notice: &NoticeItem, role: Role) -> bool {
    notice.active && notice.recipient_role.admits(role)
}

/// Notices strictly newer than the watermark, compared at second precision.
pub fn unread_count(notices: &[NoticeItem], watermark: DateTime<Utc>, role: Role) -> usize {
    notices
        .iter()
        .filter(|n| visible_to(n, role) && n.timestamp.trunc_subsecs(0) > watermark)
        .count()
}

pub fn recent(notices: &[NoticeItem], role: Role, limit: usize) -> Vec<NoticeItem> {
    let mut visible: Vec<NoticeItem> = notices
        .iter()
        .filter(|n| visible_to(n, role))
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    visible.truncate(limit);
    visible
}

pub fn badge_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        1..=9 => Some(count.to_string()),
        _ => Some("9+".to_string()),
    }
}

pub struct FreshnessTracker {
    store: Arc<dyn WatermarkStore>,
    clock: Arc<dyn Clock>,
    key: WatermarkKey,
    backlog: Duration,
}

impl FreshnessTracker {
    pub fn new(store: Arc<dyn WatermarkStore>, key: WatermarkKey) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            key,
            backlog: Duration::days(DEFAULT_BACKLOG_DAYS),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_backlog_days(mut self, days: i64) -> Self {
        self.backlog = Duration::days(days.max(0));
        self
    }

    pub fn key(&self) -> &WatermarkKey {
        &self.key
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }

    /// Stored watermark, or `now - backlog` for a user who has never looked.
    pub async fn watermark(&self) -> Result<DateTime<Utc>> {
        match self.store.read(&self.key).await? {
            Some(value) => Ok(value),
            None => Ok(self.now() - self.backlog),
        }
    }

    pub async fn unread_count(&self, notices: &[NoticeItem], role: Role) -> Result<usize> {
        let watermark = self.watermark().await?;
        Ok(unread_count(notices, watermark, role))
    }

    /// Advances the watermark to now. A clock that has gone backwards never moves it back.
    pub async fn mark_seen(&self) -> Result<DateTime<Utc>> {
        let now = self.now();
        let next = match self.store.read(&self.key).await? {
            Some(current) if current >= now => current,
            _ => now,
        };
        self.store.write(&self.key, next).await?;
        tracing::debug!(key = self.key.as_str(), watermark = %next, "notices marked seen");
        Ok(next)
    }
}
