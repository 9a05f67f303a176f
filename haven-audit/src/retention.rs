//! Retention sweep and the background engine that drives it.
//!
//! - `RetentionJanitor::purge` removes events strictly older than the
//!   retention horizon, one key at a time
//! - `JanitorEngine` runs the sweep on an interval and drains the recorder's
//!   retry queue on the same tick

use crate::config::RetentionConfig;
use crate::error::{AuditError, AuditResult};
use crate::log::AuditLog;
use crate::recorder::AuditRecorder;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub struct RetentionJanitor {
    log: AuditLog,
    config: RetentionConfig,
}

impl RetentionJanitor {
    pub fn new(log: AuditLog, config: RetentionConfig) -> Self {
        Self { log, config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Oldest timestamp that survives a sweep at `now`.
    ///
    /// A horizon reaching past the representable range keeps everything.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.config.retention_days.max(0))
            .and_then(|horizon| now.checked_sub_signed(horizon))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Deletes every event with `timestamp < cutoff(now)` across all users.
    ///
    /// Returns the number of events removed. Events at or after the cutoff
    /// are never touched.
    pub async fn purge(&self, now: DateTime<Utc>) -> AuditResult<usize> {
        let cutoff = self.cutoff(now);
        let expired: Vec<String> = self
            .log
            .scan_all()
            .await?
            .into_iter()
            .filter(|(_, event)| event.timestamp < cutoff)
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in &expired {
            if self.log.remove(key).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("retention sweep removed {removed} audit events older than {cutoff}");
        } else {
            debug!("retention sweep found nothing older than {cutoff}");
        }
        Ok(removed)
    }
}

/// Outcome of one janitor tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub purged: usize,
    pub flushed: usize,
}

#[derive(Debug)]
pub enum JanitorCommand {
    RunNow(oneshot::Sender<SweepReport>),
    Stop,
}

/// Handle for sending commands to a running [`JanitorEngine`].
#[derive(Clone)]
pub struct JanitorHandle {
    command_tx: mpsc::Sender<JanitorCommand>,
}

impl JanitorHandle {
    /// Runs a sweep immediately and waits for its result.
    pub async fn run_now(&self) -> AuditResult<SweepReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(JanitorCommand::RunNow(reply_tx))
            .await
            .map_err(|_| AuditError::EngineStopped)?;
        reply_rx.await.map_err(|_| AuditError::EngineStopped)
    }

    pub async fn stop(&self) -> AuditResult<()> {
        self.command_tx
            .send(JanitorCommand::Stop)
            .await
            .map_err(|_| AuditError::EngineStopped)
    }
}

/// Background loop for retention and audit retry.
pub struct JanitorEngine {
    janitor: Arc<RetentionJanitor>,
    recorder: Arc<AuditRecorder>,
    command_rx: mpsc::Receiver<JanitorCommand>,
    sweep_interval: StdDuration,
}

/// Creates a janitor engine and its command handle.
///
/// The caller spawns `engine.run()` on its runtime.
pub fn create_janitor_engine(
    janitor: Arc<RetentionJanitor>,
    recorder: Arc<AuditRecorder>,
    sweep_interval: StdDuration,
) -> (JanitorHandle, JanitorEngine) {
    let (command_tx, command_rx) = mpsc::channel(16);

    let engine = JanitorEngine {
        janitor,
        recorder,
        command_rx,
        sweep_interval,
    };

    (JanitorHandle { command_tx }, engine)
}

impl JanitorEngine {
    /// Runs the janitor event loop until stopped.
    pub async fn run(&mut self) {
        info!(
            "janitor engine started (sweep every {}s)",
            self.sweep_interval.as_secs()
        );

        let mut sweep_interval = tokio::time::interval(self.sweep_interval);
        // Skip first immediate tick
        sweep_interval.tick().await;

        loop {
            tokio::select! {
                _ = sweep_interval.tick() => {
                    self.sweep().await;
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(JanitorCommand::RunNow(reply)) => {
                            let report = self.sweep().await;
                            if reply.send(report).is_err() {
                                debug!("run_now caller went away before the sweep finished");
                            }
                        }
                        Some(JanitorCommand::Stop) => {
                            info!("janitor engine stopping");
                            if let Err(e) = self.recorder.flush_pending().await {
                                warn!("final audit flush incomplete: {e}");
                            }
                            break;
                        }
                        None => {
                            info!("command channel closed, stopping janitor engine");
                            break;
                        }
                    }
                }
            }
        }

        info!("janitor engine stopped");
    }

    async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.recorder.flush_pending().await {
            Ok(flushed) => report.flushed = flushed,
            Err(e) => error!("audit retry flush failed: {e}"),
        }

        match self.janitor.purge(Utc::now()).await {
            Ok(purged) => report.purged = purged,
            Err(e) => error!("retention sweep failed: {e}"),
        }

        report
    }
}
