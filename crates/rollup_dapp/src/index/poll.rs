//! Polling the notice index until the notice of an input shows up.
//!
//! A poll is bounded (deadline and/or attempt cap), backs off between attempts, and can be
//! cancelled. Index and decode failures end the poll with an error instead of being dropped.

use crate::chain::{decode_utf8_payload, NormalizeError};
use crate::index::client::{IndexError, NoticeIndexClient, NoticeKeys};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

const INITIAL_INTERVAL_MS: u64 = 1_000;
const MAX_INTERVAL_MS: u64 = 10_000;
const BACKOFF_MULTIPLIER: f64 = 1.5;
const MAX_DURATION_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Wait before the first query, and between the first two.
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
    pub max_attempts: Option<u32>,
    pub max_duration: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(INITIAL_INTERVAL_MS),
            max_interval: Duration::from_millis(MAX_INTERVAL_MS),
            backoff_multiplier: BACKOFF_MULTIPLIER,
            max_attempts: None,
            max_duration: Some(Duration::from_secs(MAX_DURATION_SECS)),
        }
    }
}

impl PollConfig {
    /// One query per `interval`, no backoff and no bound.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            backoff_multiplier: 1.0,
            max_attempts: None,
            max_duration: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.max_interval.max(self.initial_interval);
        let factor = self.backoff_multiplier.max(1.0);
        Duration::try_from_secs_f64(current.as_secs_f64() * factor).map_or(cap, |d| d.min(cap))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// Decoded text of the first notice.
    Resolved(String),
    TimedOut { attempts: u32, elapsed: Duration },
    Cancelled,
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("index: {0}")]
    Index(#[from] IndexError),
    #[error("notice payload: {0}")]
    Decode(#[from] NormalizeError),
    #[error("poll task: {0}")]
    Task(String),
}

/// Query the index for `keys` until a notice appears, the bound is hit, or `cancel` fires.
///
/// The first query is issued one interval after the call. No query follows the first
/// non-empty response.
pub async fn poll_notice(
    index: &NoticeIndexClient,
    keys: &NoticeKeys,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<PollOutcome, PollError> {
    let started = Instant::now();
    let deadline = config.max_duration.map(|d| started + d);
    let mut interval = config.initial_interval;
    let mut attempts: u32 = 0;

    loop {
        if config.max_attempts.is_some_and(|max| attempts >= max) {
            return Ok(timed_out(keys, attempts, started));
        }
        let wait = match deadline {
            Some(d) => {
                let remaining = d.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(timed_out(keys, attempts, started));
                }
                interval.min(remaining)
            }
            None => interval,
        };

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(epoch = %keys.epoch_index, input = %keys.input_index, attempts, "poll cancelled");
                return Ok(PollOutcome::Cancelled);
            }
            () = tokio::time::sleep(wait) => {}
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(timed_out(keys, attempts, started));
        }

        attempts += 1;
        let notices = tokio::select! {
            () = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            res = index.notices_for(keys) => res?,
        };
        if let Some(first) = notices.first() {
            let text = decode_utf8_payload(&first.payload)?;
            info!(
                epoch = %keys.epoch_index,
                input = %keys.input_index,
                attempts,
                "notice resolved"
            );
            return Ok(PollOutcome::Resolved(text));
        }
        interval = config.next_interval(interval);
        debug!(attempt = attempts, next_ms = interval.as_millis() as u64, "notice not yet available");
    }
}

fn timed_out(keys: &NoticeKeys, attempts: u32, started: Instant) -> PollOutcome {
    let elapsed = started.elapsed();
    info!(
        epoch = %keys.epoch_index,
        input = %keys.input_index,
        attempts,
        elapsed_ms = elapsed.as_millis() as u64,
        "notice poll timed out"
    );
    PollOutcome::TimedOut { attempts, elapsed }
}

/// Handle to a notice poll running in the background. Dropping it cancels the poll.
pub struct NoticeResponse {
    keys: NoticeKeys,
    cancel: CancellationToken,
    _guard: DropGuard,
    handle: JoinHandle<Result<PollOutcome, PollError>>,
}

impl NoticeResponse {
    /// Spawn [`poll_notice`] on the current tokio runtime.
    pub fn spawn(index: Arc<NoticeIndexClient>, keys: NoticeKeys, config: PollConfig) -> Self {
        let cancel = CancellationToken::new();
        let task_keys = keys.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            poll_notice(&index, &task_keys, &config, &task_cancel).await
        });
        Self {
            keys,
            _guard: cancel.clone().drop_guard(),
            cancel,
            handle,
        }
    }

    pub fn keys(&self) -> &NoticeKeys {
        &self.keys
    }

    /// Stop polling; [`wait`](Self::wait) then yields `PollOutcome::Cancelled`
    /// unless the poll already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels the poll. Holding a clone does not keep the poll alive once
    /// this handle is dropped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> Result<PollOutcome, PollError> {
        match self.handle.await {
            Ok(res) => res,
            Err(e) => Err(PollError::Task(e.to_string())),
        }
    }
}
