//! Client for Kubernetes-style orchestration APIs with a streaming watch core.
//!
//! The request/response surface ([`Client::create`], [`Client::list`], ...) is
//! a thin layer over an [`ApiBackend`]. The interesting part is the watch path:
//! [`Watch`] reads a newline-delimited change stream on its own thread and hands
//! events over a rendezvous channel, [`await_condition`] blocks until a
//! predicate holds, and [`Client::create_and_await`] deletes what it created
//! when the wait fails.

pub mod cancel;
pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mock;
pub mod resource;
pub mod stream;
pub mod wait;
pub mod watch;

pub use cancel::CancelToken;
pub use client::Client;
pub use config::ClientConfig;
pub use http::HttpBackend;
pub use resource::{Resource, API_PREFIX};
pub use stream::{ConnectionCloser, StreamConnection};
pub use wait::{await_condition, pod_not_pending, WaitError};
pub use watch::{Watch, WatchError, WatchEvent};

pub use kubewatch_api as api;

use kubewatch_api::ResourceVersion;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("resourceVersion for {0} must be provided")]
    MissingResourceVersion(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error: {status} {method} {url}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("client config error: {0}")]
    Config(String),
    #[error(transparent)]
    Wait(#[from] WaitError),
    #[error("timed out waiting for {kind} {name} to become ready: {source}")]
    NotReady {
        kind: &'static str,
        name: String,
        #[source]
        source: Box<ClientError>,
    },
}

/// Transport seam between typed client operations and the wire.
///
/// Paths are API-relative (`/api/v1/namespaces/default/pods`); the backend
/// owns the base URL.
pub trait ApiBackend: Send + Sync {
    /// POST a new object to a collection. Returns the created object's JSON.
    fn create(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, ClientError>;

    fn get(&self, path: &str) -> Result<Vec<u8>, ClientError>;

    /// GET a collection, optionally filtered by a label selector.
    fn list(&self, path: &str, label_selector: Option<&str>) -> Result<Vec<u8>, ClientError>;

    fn delete(&self, path: &str) -> Result<(), ClientError>;

    /// Delete used for compensating cleanup. Runs under the backend's own
    /// cleanup timeout and is never tied to a caller's cancellation.
    fn delete_detached(&self, path: &str) -> Result<(), ClientError> {
        self.delete(path)
    }

    fn patch(&self, path: &str, content_type: &str, body: &[u8]) -> Result<Vec<u8>, ClientError>;

    /// Open a streaming watch connection starting after `resource_version`.
    fn open_stream(
        &self,
        path: &str,
        resource_version: &ResourceVersion,
    ) -> Result<StreamConnection, ClientError>;
}
