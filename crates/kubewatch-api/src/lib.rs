//! Wire types for the orchestration API consumed by kubewatch.
//!
//! Only the fields the client reads or writes are modelled explicitly; unknown
//! fields of pod and container specs are carried through untouched so objects
//! survive a decode/encode cycle. Watch records are decoded by
//! [`decode_watch_record`], which also recognizes server-side `ERROR` records.

pub mod controller;
pub mod endpoints;
pub mod meta;
pub mod pod;
pub mod secret;
pub mod types;
pub mod watch;

pub use controller::{ReplicationController, ReplicationControllerSpec, ReplicationControllerStatus};
pub use endpoints::{EndpointAddress, EndpointPort, EndpointSubset, Endpoints};
pub use meta::{ListMeta, ObjectList, ObjectMeta};
pub use pod::{Container, Pod, PodPhase, PodSpec, PodStatus, PodTemplateSpec};
pub use secret::Secret;
pub use types::{NamespaceName, ObjectName, ResourceRef, ResourceVersion, DEFAULT_NAMESPACE};
pub use watch::{decode_watch_record, EventType, Status, WatchRecord};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid watch record: {0}")]
    InvalidRecord(#[source] serde_json::Error),
    #[error("invalid {kind} object in watch record: {source}")]
    InvalidObject {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
