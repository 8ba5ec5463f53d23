//! Bounded polling with an external cancellation signal.
//!
//! `poll` runs an attempt immediately, then every `interval` until the
//! attempt finishes, fails hard, the `timeout` ceiling passes, or the
//! cancellation fires. Timeout and cancellation surface as different errors.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, Instant};

use netpol_core::error::{NetpolError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Result of a single poll attempt.
#[derive(Debug)]
pub enum Step<T> {
    /// Condition met; stop polling.
    Done(T),
    /// Not yet; try again after the interval. Carries the error seen, if any.
    Retry(Option<NetpolError>),
    /// Give up immediately.
    Fail(NetpolError),
}

/// Receiving side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Sending side; `cancel()` wakes every clone of the paired `Cancellation`.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Cancellation {
    pub fn channel() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle was dropped unfired.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Poll `attempt` under `cfg`. `what` names the awaited condition in errors.
pub async fn poll<T, F, Fut>(
    cfg: &PollConfig,
    cancel: &Cancellation,
    what: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Step<T>>,
{
    let started = Instant::now();
    let deadline = started + cfg.timeout;
    let mut last: Option<NetpolError> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(NetpolError::Cancelled(what.to_string()));
        }

        let step = tokio::select! {
            s = attempt() => s,
            _ = cancel.cancelled() => return Err(NetpolError::Cancelled(what.to_string())),
        };

        match step {
            Step::Done(v) => return Ok(v),
            Step::Fail(e) => return Err(e),
            Step::Retry(e) => {
                if e.is_some() {
                    last = e;
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(NetpolError::Timeout {
                what: what.to_string(),
                waited: now - started,
                last: last.map(Box::new),
            });
        }

        let nap = cfg.interval.min(deadline - now);
        tokio::select! {
            _ = sleep(nap) => {}
            _ = cancel.cancelled() => return Err(NetpolError::Cancelled(what.to_string())),
        }
    }
}
