//! Client-side metrics for the academic portal: attendance, marks and assignment
//! roll-ups, prioritized insights, and unread-notice tracking, refreshed by a
//! cancellable poller.

pub mod assignments;
pub mod attendance;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod insights;
pub mod marks;
pub mod models;
pub mod notifications;
pub mod poller;
pub mod report;
pub mod store;

pub use error::{Error, Result};
