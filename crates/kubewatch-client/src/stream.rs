//! Long-lived streaming connections for watches.
//!
//! A watch read blocks until the server sends the next record, so the only way
//! to interrupt it is to shut the socket down from another thread. Watches run
//! on a ureq agent whose connector keeps a clone of the `TcpStream` it opened;
//! that clone backs the [`ConnectionCloser`].

use crate::ClientError;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use ureq::unversioned::resolver::DefaultResolver;
use ureq::unversioned::transport::{
    Buffers, ConnectionDetails, Connector, LazyBuffers, NextTimeout, RustlsConnector, Transport,
};

/// Error bodies of failed watch requests are cut off after this many bytes.
const MAX_ERROR_BODY: u64 = 64 * 1024;

/// Closes a connection at most once, from whichever thread gets there first.
pub struct ConnectionCloser {
    closed: AtomicBool,
    shutdown: Box<dyn Fn() + Send + Sync>,
}

impl ConnectionCloser {
    pub fn new(shutdown: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            closed: AtomicBool::new(false),
            shutdown: Box::new(shutdown),
        }
    }

    pub fn for_tcp(stream: TcpStream) -> Self {
        Self::new(move || {
            let _ = stream.shutdown(Shutdown::Both);
        })
    }

    /// Close the connection. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        (self.shutdown)();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// An open response body plus the handle that can tear it down.
pub struct StreamConnection {
    pub(crate) body: Box<dyn Read + Send>,
    pub(crate) closer: Arc<ConnectionCloser>,
}

impl StreamConnection {
    pub fn new(body: impl Read + Send + 'static, closer: ConnectionCloser) -> Self {
        Self {
            body: Box::new(body),
            closer: Arc::new(closer),
        }
    }

    pub fn closer(&self) -> Arc<ConnectionCloser> {
        Arc::clone(&self.closer)
    }
}

/// Connector for watch agents: plain TCP, with a clone of every socket it
/// opens left in `socket` for the caller to shut down.
#[derive(Debug, Default)]
struct WatchConnector {
    socket: Arc<Mutex<Option<TcpStream>>>,
}

impl Connector for WatchConnector {
    type Out = WatchTransport;

    fn connect(
        &self,
        details: &ConnectionDetails<'_>,
        _chained: Option<()>,
    ) -> Result<Option<Self::Out>, ureq::Error> {
        let timeout = details.timeout.not_zero().map(|t| *t);
        let mut last_err = None;
        for addr in &*details.addrs {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    let handle = stream.try_clone()?;
                    if let Ok(mut slot) = self.socket.lock() {
                        *slot = Some(handle);
                    }
                    debug!("watch connected to {addr}");
                    let config = details.config;
                    let buffers =
                        LazyBuffers::new(config.input_buffer_size(), config.output_buffer_size());
                    return Ok(Some(WatchTransport { stream, buffers }));
                }
                Err(e) if is_timeout(&e) => {
                    last_err = Some(ureq::Error::Timeout(details.timeout.reason));
                }
                Err(e) => last_err = Some(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses").into()
        }))
    }
}

/// Blocking TCP transport. Never reports itself open, so a watch socket is not
/// handed back to a pool once its body ends.
#[derive(Debug)]
struct WatchTransport {
    stream: TcpStream,
    buffers: LazyBuffers,
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

impl Transport for WatchTransport {
    fn buffers(&mut self) -> &mut dyn Buffers {
        &mut self.buffers
    }

    fn transmit_output(&mut self, amount: usize, timeout: NextTimeout) -> Result<(), ureq::Error> {
        self.stream.set_write_timeout(timeout.not_zero().map(|t| *t))?;
        let output = &self.buffers.output()[..amount];
        match self.stream.write_all(output) {
            Ok(()) => Ok(()),
            Err(e) if is_timeout(&e) => Err(ureq::Error::Timeout(timeout.reason)),
            Err(e) => Err(e.into()),
        }
    }

    fn await_input(&mut self, timeout: NextTimeout) -> Result<bool, ureq::Error> {
        self.stream.set_read_timeout(timeout.not_zero().map(|t| *t))?;
        let input = self.buffers.input_append_buf();
        let amount = match self.stream.read(input) {
            Ok(n) => n,
            Err(e) if is_timeout(&e) => return Err(ureq::Error::Timeout(timeout.reason)),
            Err(e) => return Err(e.into()),
        };
        self.buffers.input_appended(amount);
        Ok(amount > 0)
    }

    fn is_open(&mut self) -> bool {
        false
    }
}

/// Open a streaming GET of `url` for changes after `resource_version`.
///
/// Each watch gets its own agent so the socket it records belongs to this
/// request alone. `https://` hosts are wrapped in TLS by ureq's rustls
/// connector with its default roots.
pub fn open(
    url: &str,
    resource_version: &str,
    connect_timeout: Duration,
) -> Result<StreamConnection, ClientError> {
    let socket = Arc::new(Mutex::new(None));
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_connect(Some(connect_timeout))
        .build();
    let connector = WatchConnector {
        socket: Arc::clone(&socket),
    }
    .chain(RustlsConnector::default());
    let agent = ureq::Agent::with_parts(config, connector, DefaultResolver::default());

    let response = agent
        .get(url)
        .header("Accept", "application/json")
        .query("resourceVersion", resource_version)
        .call()
        .map_err(|e| ClientError::Transport(format!("failed to make request: GET {url:?}: {e}")))?;

    let handle = socket
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
        .ok_or_else(|| ClientError::Transport(format!("no connection recorded for GET {url:?}")))?;
    let closer = ConnectionCloser::for_tcp(handle);

    let status = response.status().as_u16();
    debug!("GET {url} -> {status} (watch)");
    let mut body = response.into_body();
    if status != 200 {
        let text = body
            .with_config()
            .limit(MAX_ERROR_BODY)
            .lossy_utf8(true)
            .read_to_string()
            .unwrap_or_default();
        closer.close();
        return Err(ClientError::Status {
            method: "GET",
            url: url.to_owned(),
            status,
            body: text,
        });
    }

    Ok(StreamConnection::new(body.into_reader(), closer))
}
