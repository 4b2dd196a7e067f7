use crate::watch::{Watch, WatchError, WatchEvent};
use kubewatch_api::{Pod, PodPhase};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("watch transport failed: {0}")]
    Transport(String),
    #[error("failed to decode watch record: {0}")]
    Decode(String),
    #[error("server reported watch error: {0}")]
    Remote(String),
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("wait cancelled")]
    Cancelled,
    #[error("watch stream ended before the condition was met")]
    StreamEnded,
}

impl From<WatchError> for WaitError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::Transport(msg) => WaitError::Transport(msg),
            WatchError::Decode(msg) => WaitError::Decode(msg),
            WatchError::Remote(msg) => WaitError::Remote(msg),
            WatchError::Cancelled => WaitError::Cancelled,
        }
    }
}

/// Consume events from `watch` until `predicate` holds for an object.
///
/// Events are taken one at a time, so nothing past the satisfying event is
/// read off the wire. The watch is left running; tearing it down is the
/// caller's job.
pub fn await_condition<T, F>(
    watch: &Watch<T>,
    mut predicate: F,
    timeout: Duration,
) -> Result<T, WaitError>
where
    F: FnMut(&T) -> bool,
{
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let event = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(WaitError::DeadlineExceeded(timeout));
                }
                match watch.recv_timeout(remaining) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(WaitError::DeadlineExceeded(timeout))
                    }
                    Err(RecvTimeoutError::Disconnected) => return Err(WaitError::StreamEnded),
                }
            }
            // Timeout too large to represent: wait without a deadline.
            None => watch.recv().ok_or(WaitError::StreamEnded)?,
        };

        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => {
                if predicate(&obj) {
                    return Ok(obj);
                }
            }
            WatchEvent::Error(err) => {
                debug!("wait ended by watch error: {err}");
                return Err(err.into());
            }
        }
    }
}

/// True once the pod has left the `Pending` phase.
///
/// Any other phase counts, including `Failed`, `Unknown` and a missing one.
pub fn pod_not_pending(pod: &Pod) -> bool {
    pod.phase() != Some(PodPhase::Pending)
}
