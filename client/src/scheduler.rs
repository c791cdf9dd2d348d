//! Sync service - turns app events into serialized sync cycles
//!
//! The [`SyncService`] owns one worker task that runs the
//! [`SyncPipeline`]. At most one cycle is in flight; triggers arriving while
//! a cycle runs collapse into a single re-run afterwards.
//!
//! ## Flow
//!
//! ```text
//! on_login / on_local_mutation / on_app_start ──→ Notify ──→ worker ──→ SyncPipeline::run
//!                                    on_logout ──→ watch ──→ cancels in-flight cycle
//! ```
//!
//! The worker is the only writer of the sync token. It advances only after a
//! completed cycle and is dropped on logout, so the next login starts again
//! from the local modification date.

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::pipeline::{CycleOutcome, SyncPipeline};
use crate::ports::{LocalModificationDateFetcher, SyncToken};

/// Observable state of the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Token the next cycle starts from, if known
    pub token: Option<SyncToken>,
    /// A cycle is in flight
    pub running: bool,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    /// Message of the most recent failure, cleared by a completed cycle
    pub last_error: Option<String>,
}

/// Handle to the background sync worker.
pub struct SyncService {
    trigger: Arc<Notify>,
    login: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<ServiceStatus>,
    worker: JoinHandle<()>,
}

impl SyncService {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(
        pipeline: SyncPipeline,
        dates: Arc<dyn LocalModificationDateFetcher>,
        logged_in: bool,
    ) -> Self {
        let trigger = Arc::new(Notify::new());
        let (login_tx, login_rx) = watch::channel(logged_in);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ServiceStatus::default());

        info!(
            resources = ?pipeline.adapters().collect::<Vec<_>>(),
            logged_in,
            "Starting sync service"
        );

        let worker = Worker {
            pipeline,
            dates,
            trigger: Arc::clone(&trigger),
            login: login_rx,
            shutdown: shutdown_rx,
            status: status_tx,
            token: None,
        };

        Self {
            trigger,
            login: login_tx,
            shutdown: shutdown_tx,
            status: status_rx,
            worker: tokio::spawn(worker.run()),
        }
    }

    pub fn on_login(&self) {
        self.login.send_replace(true);
        self.request_cycle();
    }

    /// Cancels the in-flight cycle, if any.
    pub fn on_logout(&self) {
        self.login.send_replace(false);
    }

    pub fn on_local_mutation(&self) {
        self.request_cycle();
    }

    pub fn on_app_start(&self) {
        self.request_cycle();
    }

    fn request_cycle(&self) {
        if *self.login.borrow() {
            self.trigger.notify_one();
        } else {
            debug!("Ignoring sync trigger while logged out");
        }
    }

    pub fn status(&self) -> ServiceStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceStatus> {
        self.status.clone()
    }

    /// Stop the worker, cancelling the in-flight cycle.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Sync worker terminated abnormally");
        }
        info!("Sync service stopped");
    }
}

struct Worker {
    pipeline: SyncPipeline,
    dates: Arc<dyn LocalModificationDateFetcher>,
    trigger: Arc<Notify>,
    login: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
    status: watch::Sender<ServiceStatus>,
    token: Option<SyncToken>,
}

async fn logged_out(login: &mut watch::Receiver<bool>) {
    // A closed channel means the service handle is gone.
    let _ = login.wait_for(|logged_in| !*logged_in).await;
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.trigger.notified() => {}
                changed = self.login.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !*self.login.borrow_and_update() {
                        self.forget_token();
                    }
                    continue;
                }
                _ = self.shutdown.changed() => break,
            }

            if !*self.login.borrow() {
                continue;
            }
            if !self.cycle().await {
                break;
            }
        }
        debug!("Sync worker exiting");
    }

    /// Run one cycle. Returns false when the service is shutting down.
    async fn cycle(&mut self) -> bool {
        let token = match self.token {
            Some(token) => Some(token),
            None => match self.dates.local_last_modification_date().await {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "Failed to read local modification date");
                    self.record_failure(e.to_string());
                    return true;
                }
            },
        };

        self.status.send_modify(|s| s.running = true);

        let pipeline = &self.pipeline;
        let result = tokio::select! {
            result = pipeline.run(token) => Some(result),
            _ = logged_out(&mut self.login) => None,
            _ = self.shutdown.changed() => {
                self.status.send_modify(|s| s.running = false);
                return false;
            }
        };

        self.status.send_modify(|s| s.running = false);

        match result {
            Some(Ok(CycleOutcome::Completed(report))) => {
                self.token = Some(report.token);
                self.status.send_modify(|s| {
                    s.token = Some(report.token);
                    s.cycles_completed += 1;
                    s.last_error = None;
                });
            }
            Some(Ok(CycleOutcome::Skipped)) => {}
            Some(Err(e)) => self.record_failure(e.to_string()),
            None => {
                info!("Sync cycle cancelled by logout");
                self.forget_token();
                self.record_failure(SyncError::Cancelled.to_string());
            }
        }
        true
    }

    fn forget_token(&mut self) {
        self.token = None;
        self.status.send_modify(|s| s.token = None);
    }

    fn record_failure(&self, message: String) {
        self.status.send_modify(|s| {
            s.cycles_failed += 1;
            s.last_error = Some(message);
        });
    }
}
