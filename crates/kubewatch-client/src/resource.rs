use kubewatch_api::{Endpoints, ObjectMeta, Pod, ReplicationController, ResourceRef, Secret};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const API_PREFIX: &str = "/api/v1";

/// Capabilities shared by every namespaced resource kind.
///
/// The generic client only needs a kind's name, its URL segment and access to
/// its metadata; everything else about the object is opaque to it.
pub trait Resource: Serialize + DeserializeOwned + Send + 'static {
    /// Kind name used in messages, e.g. `Pod`.
    const KIND: &'static str;
    /// Collection segment in URLs, e.g. `pods`.
    const PLURAL: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    fn resource_ref(&self) -> ResourceRef {
        self.metadata().resource_ref()
    }

    fn collection_path(namespace: &str) -> String {
        format!("{API_PREFIX}/namespaces/{namespace}/{}", Self::PLURAL)
    }

    fn item_path(namespace: &str, name: &str) -> String {
        format!("{}/{name}", Self::collection_path(namespace))
    }

    fn watch_path(namespace: &str, name: &str) -> String {
        format!(
            "{API_PREFIX}/watch/namespaces/{namespace}/{}/{name}",
            Self::PLURAL
        )
    }
}

impl Resource for Pod {
    const KIND: &'static str = "Pod";
    const PLURAL: &'static str = "pods";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl Resource for ReplicationController {
    const KIND: &'static str = "ReplicationController";
    const PLURAL: &'static str = "replicationcontrollers";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl Resource for Secret {
    const KIND: &'static str = "Secret";
    const PLURAL: &'static str = "secrets";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl Resource for Endpoints {
    const KIND: &'static str = "Endpoints";
    const PLURAL: &'static str = "endpoints";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
