use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::notifications::DEFAULT_BACKLOG_DAYS;
use crate::poller::PollIntervals;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; only commands that touch the database need it
    pub database_url: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub poll: PollIntervals,
    /// How far back a first-time viewer's unread window reaches
    pub backlog_days: i64,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PollIntervals::default();

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            log_level: lookup("PULSE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            poll: PollIntervals {
                attendance: poll_secs(&lookup, "PULSE_ATTENDANCE_POLL_SECS", defaults.attendance)?,
                dashboard: poll_secs(&lookup, "PULSE_DASHBOARD_POLL_SECS", defaults.dashboard)?,
            },
            backlog_days: parse_or(&lookup, "PULSE_BACKLOG_DAYS", DEFAULT_BACKLOG_DAYS)?,
            max_connections: parse_or(&lookup, "PULSE_DB_MAX_CONNECTIONS", 5)?,
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| Error::Config("DATABASE_URL must be set to a Postgres instance".into()))
    }
}

fn poll_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, key, default.as_secs())? {
        0 => Err(Error::Config(format!("{key} must be at least 1 second"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid {key} value {raw:?}"))),
    }
}
