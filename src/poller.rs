use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dashboard::{self, DashboardSnapshot, NoticeSnapshot, Viewer};
use crate::models::AttendanceSummary;
use crate::notifications::FreshnessTracker;
use crate::store::{RecordStore, Scope};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub attendance: Duration,
    pub dashboard: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            attendance: Duration::from_secs(15),
            dashboard: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    label: &'static str,
}

impl Scheduler {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }

    /// Runs `task` now and then every `every`, never overlapping two cycles.
    pub fn start<F, Fut>(&self, every: Duration, mut task: F) -> PollHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let label = self.label;
        let every = if every.is_zero() {
            warn!("{label} poller given a zero interval, using {}s", MIN_INTERVAL.as_secs());
            MIN_INTERVAL
        } else {
            every
        };

        info!("Starting {label} poller (interval: {}s)", every.as_secs_f64());

        let loop_token = token.clone();
        let loop_refresh = Arc::clone(&refresh);
        tokio::spawn(async move {
            let mut timer = interval(every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = loop_refresh.notified() => debug!("{label}: manual refresh"),
                    _ = timer.tick() => debug!("{label}: tick"),
                }

                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = task() => {}
                }
                timer.reset();
            }

            debug!("{label} poller stopped");
        });

        PollHandle { token, refresh }
    }
}

#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    refresh: Arc<Notify>,
}

impl PollHandle {
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub fn watch_attendance(
    scheduler: &Scheduler,
    every: Duration,
    store: Arc<dyn RecordStore>,
    scope: Scope,
) -> (PollHandle, watch::Receiver<Option<AttendanceSummary>>) {
    let (tx, rx) = watch::channel(None);
    let tx = Arc::new(tx);
    let handle = scheduler.start(every, move || {
        let store = Arc::clone(&store);
        let tx = Arc::clone(&tx);
        async move {
            let (summary, _) = dashboard::refresh_attendance(store.as_ref(), scope).await;
            tx.send_replace(Some(summary));
        }
    });
    (handle, rx)
}

pub fn watch_dashboard(
    scheduler: &Scheduler,
    every: Duration,
    store: Arc<dyn RecordStore>,
    viewer: Viewer,
) -> (PollHandle, watch::Receiver<Option<DashboardSnapshot>>) {
    let (tx, rx) = watch::channel(None);
    let tx = Arc::new(tx);
    let handle = scheduler.start(every, move || {
        let store = Arc::clone(&store);
        let tx = Arc::clone(&tx);
        async move {
            let snapshot = dashboard::refresh_dashboard(store.as_ref(), viewer).await;
            tx.send_replace(Some(snapshot));
        }
    });
    (handle, rx)
}

pub fn watch_notices(
    scheduler: &Scheduler,
    every: Duration,
    store: Arc<dyn RecordStore>,
    tracker: Arc<FreshnessTracker>,
    viewer: Viewer,
) -> (PollHandle, watch::Receiver<Option<NoticeSnapshot>>) {
    let (tx, rx) = watch::channel(None);
    let tx = Arc::new(tx);
    let handle = scheduler.start(every, move || {
        let store = Arc::clone(&store);
        let tracker = Arc::clone(&tracker);
        let tx = Arc::clone(&tx);
        async move {
            let snapshot = dashboard::refresh_notices(store.as_ref(), &tracker, viewer.role).await;
            tx.send_replace(Some(snapshot));
        }
    });
    (handle, rx)
}
