//! Change-stream reader.
//!
//! [`Watch::spawn`] starts two threads per watch:
//!
//! - the reader decodes one newline-terminated record at a time and hands each
//!   event to the consumer over a zero-capacity channel, so it never reads
//!   ahead of what has been consumed;
//! - the supervisor waits on the watch's cancellation scope and shuts the
//!   connection down, which is what unblocks a reader stuck in `read`.
//!
//! Both threads close the connection on their way out; [`ConnectionCloser`]
//! turns the second close into a no-op. The sequence ends with at most one
//! [`WatchEvent::Error`], and with none at all when the peer closes cleanly.

use crate::cancel::CancelToken;
use crate::stream::{ConnectionCloser, StreamConnection};
use crate::ClientError;
use kubewatch_api::{decode_watch_record, EventType, WatchRecord};
use serde::de::DeserializeOwned;
use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Terminal failure of a watch stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("error reading streaming response body: {0}")]
    Transport(String),
    #[error("failed to decode watch record: {0}")]
    Decode(String),
    #[error("server reported watch error: {0}")]
    Remote(String),
    #[error("watch cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
    Error(WatchError),
}

impl<T> WatchEvent<T> {
    /// `None` for the terminal error marker.
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            WatchEvent::Added(_) => Some(EventType::Added),
            WatchEvent::Modified(_) => Some(EventType::Modified),
            WatchEvent::Deleted(_) => Some(EventType::Deleted),
            WatchEvent::Error(_) => None,
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => Some(o),
            WatchEvent::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&WatchError> {
        match self {
            WatchEvent::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl<T> From<WatchRecord<T>> for WatchEvent<T> {
    fn from(record: WatchRecord<T>) -> Self {
        match record {
            WatchRecord::Added(o) => WatchEvent::Added(o),
            WatchRecord::Modified(o) => WatchEvent::Modified(o),
            WatchRecord::Deleted(o) => WatchEvent::Deleted(o),
            WatchRecord::Error(status) => WatchEvent::Error(WatchError::Remote(status.to_string())),
        }
    }
}

/// Handle to a running watch. Single consumer; not restartable.
///
/// Dropping the handle cancels the watch. [`Watch::stop`] also waits for both
/// threads to finish.
pub struct Watch<T> {
    events: Option<Receiver<WatchEvent<T>>>,
    scope: CancelToken,
    closer: Arc<ConnectionCloser>,
    reader: Option<JoinHandle<()>>,
    supervisor: Option<JoinHandle<()>>,
}

impl<T: DeserializeOwned + Send + 'static> Watch<T> {
    /// Start reading `connection`. Cancelling `cancel` (or any parent of it)
    /// force-closes the connection.
    pub fn spawn(connection: StreamConnection, cancel: &CancelToken) -> Result<Self, ClientError> {
        let StreamConnection { body, closer } = connection;
        let scope = cancel.child_token();
        let (tx, rx) = sync_channel(0);

        let reader_scope = scope.clone();
        let reader_closer = Arc::clone(&closer);
        let reader = thread::Builder::new()
            .name("kubewatch-reader".to_owned())
            .spawn(move || {
                read_events::<T>(body, &tx, &reader_scope);
                reader_closer.close();
                reader_scope.cancel();
            });
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                closer.close();
                return Err(e.into());
            }
        };

        let supervisor_scope = scope.clone();
        let supervisor_closer = Arc::clone(&closer);
        let supervisor = thread::Builder::new()
            .name("kubewatch-supervisor".to_owned())
            .spawn(move || {
                supervisor_scope.wait();
                if supervisor_closer.close() {
                    debug!("watch connection force-closed");
                }
            });
        let supervisor = match supervisor {
            Ok(handle) => handle,
            Err(e) => {
                // The reader exits once the connection is gone.
                closer.close();
                scope.cancel();
                return Err(e.into());
            }
        };

        Ok(Self {
            events: Some(rx),
            scope,
            closer,
            reader: Some(reader),
            supervisor: Some(supervisor),
        })
    }
}

impl<T> Watch<T> {
    /// Block for the next event. `None` once the stream has ended.
    pub fn recv(&self) -> Option<WatchEvent<T>> {
        self.events.as_ref()?.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<WatchEvent<T>, RecvTimeoutError> {
        match &self.events {
            Some(rx) => rx.recv_timeout(timeout),
            None => Err(RecvTimeoutError::Disconnected),
        }
    }

    /// Request cancellation without waiting for the threads.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    pub fn is_connection_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Cancel the watch, release the connection and join both threads.
    pub fn stop(mut self) {
        self.scope.cancel();
        drop(self.events.take());
        for handle in [self.reader.take(), self.supervisor.take()].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("watch thread panicked");
            }
        }
    }
}

impl<T> Iterator for Watch<T> {
    type Item = WatchEvent<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl<T> Drop for Watch<T> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

fn read_events<T: DeserializeOwned>(
    body: impl Read,
    tx: &SyncSender<WatchEvent<T>>,
    scope: &CancelToken,
) {
    let mut reader = BufReader::new(body);
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line);
        if scope.is_cancelled() {
            let _ = tx.send(WatchEvent::Error(WatchError::Cancelled));
            return;
        }
        match read {
            Ok(0) => {
                debug!("watch stream closed by peer");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("watch stream read failed: {e}");
                let _ = tx.send(WatchEvent::Error(WatchError::Transport(e.to_string())));
                return;
            }
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let event = match decode_watch_record::<T>(&line) {
            Ok(record) => WatchEvent::from(record),
            Err(e) => {
                warn!("{e}");
                let _ = tx.send(WatchEvent::Error(WatchError::Decode(e.to_string())));
                return;
            }
        };
        let terminal = event.error().is_some();
        trace!("watch event {:?}", event.event_type());
        if tx.send(event).is_err() || terminal {
            return;
        }
    }
}
