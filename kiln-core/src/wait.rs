//! Wait - Poll an asynchronous status until it settles
//!
//! Providers use this to block until a remote resource reaches a target
//! status, fails, or the deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Give up after this long
    pub timeout: Duration,
    /// Delay between probes
    pub interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq)]
pub enum WaitStatus<T> {
    /// Still transitioning; carries the observed status for logging and timeout errors
    Pending(String),
    /// Target status reached
    Ready(T),
    /// Terminal failure status
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError<E: std::error::Error + 'static> {
    #[error("timeout while waiting ({elapsed:?} elapsed, last status: {})", last_status.as_deref().unwrap_or("unknown"))]
    Timeout {
        elapsed: Duration,
        last_status: Option<String>,
    },

    #[error("unexpected state: {0}")]
    Failed(String),

    #[error(transparent)]
    Probe(E),
}

/// Call `probe` until it reports `Ready` or `Failed`, or the timeout elapses
///
/// The first probe runs immediately. A probe that is still running when the
/// deadline passes is allowed to finish; the timeout is checked between probes.
pub async fn wait_until<T, E, F, Fut>(config: WaitConfig, mut probe: F) -> Result<T, WaitError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WaitStatus<T>, E>>,
{
    let started = Instant::now();
    let mut last_status = None;

    loop {
        match probe().await.map_err(WaitError::Probe)? {
            WaitStatus::Ready(value) => return Ok(value),
            WaitStatus::Failed(message) => return Err(WaitError::Failed(message)),
            WaitStatus::Pending(status) => {
                log::debug!("still waiting, status: {}", status);
                last_status = Some(status);
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= config.timeout {
            return Err(WaitError::Timeout {
                elapsed,
                last_status,
            });
        }

        let remaining = config.timeout - elapsed;
        tokio::time::sleep(config.interval.min(remaining)).await;
    }
}
