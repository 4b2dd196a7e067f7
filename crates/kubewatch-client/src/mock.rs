//! In-memory [`ApiBackend`] and scriptable watch streams.

use crate::resource::API_PREFIX;
use crate::stream::{ConnectionCloser, StreamConnection};
use crate::{ApiBackend, ClientError};
use kubewatch_api::ResourceVersion;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How often a blocked pipe read checks whether it has been closed.
const PIPE_POLL: Duration = Duration::from_millis(5);

/// A request observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create(String),
    Get(String),
    List(String, Option<String>),
    Delete(String),
    DeleteDetached(String),
    Patch(String),
    OpenStream(String, String),
}

#[derive(Default)]
struct MockState {
    objects: BTreeMap<String, Value>,
    calls: Vec<MockCall>,
    streams: VecDeque<StreamConnection>,
}

/// Backend that stores objects in memory and serves scripted watch streams.
pub struct MockBackend {
    state: Mutex<MockState>,
    next_version: AtomicU64,
    omit_resource_version: AtomicBool,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_version: AtomicU64::new(1),
            omit_resource_version: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a connection for the next `open_stream` call.
    pub fn push_stream(&self, connection: StreamConnection) {
        self.lock().streams.push_back(connection);
    }

    /// Queue a finite stream made of the given lines (newlines are appended).
    pub fn push_stream_lines(&self, lines: &[&str]) {
        let mut body = String::new();
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
        self.push_stream(StreamConnection::new(
            Cursor::new(body.into_bytes()),
            ConnectionCloser::new(|| {}),
        ));
    }

    /// Created objects come back without `metadata.resourceVersion`.
    pub fn omit_resource_version(&self, omit: bool) {
        self.omit_resource_version.store(omit, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Paths of every delete, detached or not, in call order.
    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Delete(p) | MockCall::DeleteDetached(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().objects.contains_key(path)
    }

    /// Store an object directly, bypassing `create`.
    pub fn insert(&self, path: &str, object: Value) {
        self.lock().objects.insert(path.to_owned(), object);
    }

    fn remove(&self, path: &str) -> Result<(), ClientError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClientError::Transport(format!("DELETE {path}: injected failure")));
        }
        match self.lock().objects.remove(path) {
            Some(_) => Ok(()),
            None => Err(ClientError::NotFound(path.to_owned())),
        }
    }
}

fn matches_selector(object: &Value, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => object["metadata"]["labels"][k].as_str() == Some(v),
            None => !object["metadata"]["labels"][term].is_null(),
        })
}

impl ApiBackend for MockBackend {
    fn create(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.lock().calls.push(MockCall::Create(path.to_owned()));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                method: "POST",
                url: path.to_owned(),
                status: 500,
                body: "injected failure".to_owned(),
            });
        }
        let mut object: Value = serde_json::from_slice(body)?;
        let name = object["metadata"]["name"].as_str().unwrap_or_default().to_owned();
        if name.is_empty() {
            return Err(ClientError::Status {
                method: "POST",
                url: path.to_owned(),
                status: 422,
                body: "metadata.name is required".to_owned(),
            });
        }
        if !self.omit_resource_version.load(Ordering::SeqCst) {
            let version = self.next_version.fetch_add(1, Ordering::SeqCst);
            object["metadata"]["resourceVersion"] = Value::String(version.to_string());
        }

        let item_path = format!("{path}/{name}");
        let mut state = self.lock();
        if state.objects.contains_key(&item_path) {
            return Err(ClientError::Status {
                method: "POST",
                url: path.to_owned(),
                status: 409,
                body: format!("{name} already exists"),
            });
        }
        state.objects.insert(item_path, object.clone());
        Ok(serde_json::to_vec(&object)?)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Get(path.to_owned()));
        if let Some(object) = state.objects.get(path) {
            return Ok(serde_json::to_vec(object)?);
        }
        // Raw sub-resources such as pod logs are stored as strings.
        match path.rsplit_once('/') {
            Some((parent, "log")) => match state.objects.get(parent) {
                Some(object) => Ok(object["log"].as_str().unwrap_or_default().as_bytes().to_vec()),
                None => Err(ClientError::NotFound(path.to_owned())),
            },
            _ => Err(ClientError::NotFound(path.to_owned())),
        }
    }

    fn list(&self, path: &str, label_selector: Option<&str>) -> Result<Vec<u8>, ClientError> {
        let mut state = self.lock();
        state
            .calls
            .push(MockCall::List(path.to_owned(), label_selector.map(str::to_owned)));
        let prefix = format!("{path}/");
        let items: Vec<&Value> = state
            .objects
            .iter()
            .filter(|(p, _)| p.starts_with(&prefix) && !p[prefix.len()..].contains('/'))
            .map(|(_, o)| o)
            .filter(|o| label_selector.map_or(true, |s| matches_selector(o, s)))
            .collect();
        Ok(serde_json::to_vec(&serde_json::json!({
            "metadata": {},
            "items": items,
        }))?)
    }

    fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.lock().calls.push(MockCall::Delete(path.to_owned()));
        self.remove(path)
    }

    fn delete_detached(&self, path: &str) -> Result<(), ClientError> {
        self.lock()
            .calls
            .push(MockCall::DeleteDetached(path.to_owned()));
        self.remove(path)
    }

    fn patch(&self, path: &str, _content_type: &str, body: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Patch(path.to_owned()));
        let ops: Vec<Value> = serde_json::from_slice(body)?;
        let object = state
            .objects
            .get_mut(path)
            .ok_or_else(|| ClientError::NotFound(path.to_owned()))?;
        for op in ops {
            let pointer = op["path"].as_str().unwrap_or_default();
            match (op["op"].as_str(), object.pointer_mut(pointer)) {
                (Some("replace"), Some(target)) => *target = op["value"].clone(),
                _ => {
                    return Err(ClientError::Status {
                        method: "PATCH",
                        url: path.to_owned(),
                        status: 422,
                        body: format!("cannot apply {op}"),
                    })
                }
            }
        }
        Ok(serde_json::to_vec(object)?)
    }

    fn open_stream(
        &self,
        path: &str,
        resource_version: &ResourceVersion,
    ) -> Result<StreamConnection, ClientError> {
        let mut state = self.lock();
        state.calls.push(MockCall::OpenStream(
            path.to_owned(),
            resource_version.to_string(),
        ));
        if !path.starts_with(API_PREFIX) {
            return Err(ClientError::NotFound(path.to_owned()));
        }
        state
            .streams
            .pop_front()
            .ok_or_else(|| ClientError::Transport(format!("GET {path}: no scripted watch stream")))
    }
}

/// Writing half of a [`pipe`].
pub struct PipeWriter {
    tx: Option<Sender<Vec<u8>>>,
    pending: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl PipeWriter {
    /// Send one chunk. Returns `false` once the reading side is gone.
    pub fn send(&self, data: &[u8]) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        tx.send(data.to_vec()).is_ok()
    }

    pub fn send_line(&self, line: &str) -> bool {
        let mut data = line.trim_end_matches('\n').as_bytes().to_vec();
        data.push(b'\n');
        self.send(&data)
    }

    /// Chunks sent but not yet picked up by the reader.
    pub fn unread_chunks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether the connection has been force-closed from the reading side.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Simulate the peer closing the connection (EOF after buffered data).
    pub fn finish(mut self) {
        self.tx.take();
    }
}

struct PipeReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
    pending: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.buf.len() {
            if self.closed.load(Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "connection closed locally",
                ));
            }
            match self.rx.recv_timeout(PIPE_POLL) {
                Ok(chunk) => {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// An in-process connection whose peer never closes unless told to.
///
/// Closing the returned connection's [`ConnectionCloser`] makes a blocked
/// read fail, the same way shutting down a socket does.
pub fn pipe() -> (PipeWriter, StreamConnection) {
    let (tx, rx) = channel();
    let pending = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicBool::new(false));
    let reader = PipeReader {
        rx,
        buf: Vec::new(),
        pos: 0,
        pending: Arc::clone(&pending),
        closed: Arc::clone(&closed),
    };
    let flag = Arc::clone(&closed);
    let closer = ConnectionCloser::new(move || flag.store(true, Ordering::SeqCst));
    (
        PipeWriter {
            tx: Some(tx),
            pending,
            closed,
        },
        StreamConnection::new(reader, closer),
    )
}
