use crate::cancel::CancelToken;
use crate::resource::Resource;
use crate::watch::Watch;
use crate::{ApiBackend, ClientConfig, ClientError, HttpBackend};
use kubewatch_api::{
    Endpoints, ObjectList, Pod, ReplicationController, ResourceRef, ResourceVersion, Secret,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const JSON_PATCH: &str = "application/json-patch+json";

/// Typed operations over an [`ApiBackend`].
pub struct Client {
    backend: Arc<dyn ApiBackend>,
    await_timeout: Duration,
}

impl Client {
    /// Client talking HTTP to `config.host`.
    pub fn new(config: ClientConfig) -> Self {
        let await_timeout = config.await_timeout();
        Self {
            backend: Arc::new(HttpBackend::new(config)),
            await_timeout,
        }
    }

    pub fn with_backend(backend: Arc<dyn ApiBackend>, await_timeout: Duration) -> Self {
        Self {
            backend,
            await_timeout,
        }
    }

    pub fn backend(&self) -> &dyn ApiBackend {
        self.backend.as_ref()
    }

    /// Deadline used by [`Client::create_pod`].
    pub fn await_timeout(&self) -> Duration {
        self.await_timeout
    }

    pub fn create<R: Resource>(&self, object: &R) -> Result<R, ClientError> {
        let namespace = object.metadata().namespace_or_default();
        let body = serde_json::to_vec(object)?;
        let out = self.backend.create(&R::collection_path(namespace), &body)?;
        let created: R = serde_json::from_slice(&out)?;
        info!(
            "created {} {} at version {:?}",
            R::KIND,
            created.resource_ref(),
            created.metadata().resource_version.as_str()
        );
        Ok(created)
    }

    pub fn get<R: Resource>(&self, namespace: &str, name: &str) -> Result<R, ClientError> {
        let out = self.backend.get(&R::item_path(namespace, name))?;
        Ok(serde_json::from_slice(&out)?)
    }

    pub fn list<R: Resource>(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<R>, ClientError> {
        let out = self
            .backend
            .list(&R::collection_path(namespace), label_selector)?;
        let list: ObjectList<R> = serde_json::from_slice(&out)?;
        debug!("listed {} {} objects in {namespace}", list.items.len(), R::KIND);
        Ok(list.items)
    }

    pub fn delete<R: Resource>(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.backend.delete(&R::item_path(namespace, name))?;
        info!("deleted {} {namespace}/{name}", R::KIND);
        Ok(())
    }

    /// Start watching one object for changes after `resource_version`.
    ///
    /// Fails with [`ClientError::MissingResourceVersion`] before touching the
    /// backend when the version is empty.
    pub fn watch<R: Resource>(
        &self,
        reference: &ResourceRef,
        resource_version: &ResourceVersion,
        cancel: &CancelToken,
    ) -> Result<Watch<R>, ClientError> {
        if resource_version.is_empty() {
            return Err(ClientError::MissingResourceVersion(format!(
                "{} {reference}",
                R::KIND
            )));
        }
        let path = R::watch_path(&reference.namespace, &reference.name);
        let connection = self.backend.open_stream(&path, resource_version)?;
        debug!("watching {} {reference} from version {resource_version}", R::KIND);
        Watch::spawn(connection, cancel)
    }

    pub fn watch_pod(
        &self,
        reference: &ResourceRef,
        resource_version: &ResourceVersion,
        cancel: &CancelToken,
    ) -> Result<Watch<Pod>, ClientError> {
        self.watch(reference, resource_version, cancel)
    }

    pub fn list_pods(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Pod>, ClientError> {
        self.list(namespace, label_selector)
    }

    pub fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.delete::<Pod>(namespace, name)
    }

    /// Plain-text log of the pod's (single) container.
    pub fn pod_log(&self, namespace: &str, name: &str) -> Result<String, ClientError> {
        let out = self
            .backend
            .get(&format!("{}/log", Pod::item_path(namespace, name)))?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn create_replication_controller(
        &self,
        rc: &ReplicationController,
    ) -> Result<ReplicationController, ClientError> {
        self.create(rc)
    }

    pub fn list_replication_controllers(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<ReplicationController>, ClientError> {
        self.list(namespace, label_selector)
    }

    pub fn delete_replication_controller(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError> {
        self.delete::<ReplicationController>(namespace, name)
    }

    /// Point the controller's first container at `image:version`.
    pub fn update_replication_controller_image(
        &self,
        namespace: &str,
        name: &str,
        image: &str,
        version: &str,
    ) -> Result<ReplicationController, ClientError> {
        let patch = json!([{
            "op": "replace",
            "path": "/spec/template/spec/containers/0/image",
            "value": format!("{image}:{version}"),
        }]);
        let body = serde_json::to_vec(&patch)?;
        let out = self.backend.patch(
            &ReplicationController::item_path(namespace, name),
            JSON_PATCH,
            &body,
        )?;
        info!("set image of ReplicationController {namespace}/{name} to {image}:{version}");
        Ok(serde_json::from_slice(&out)?)
    }

    pub fn create_secret(&self, secret: &Secret) -> Result<Secret, ClientError> {
        self.create(secret)
    }

    pub fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
        self.get(namespace, name)
    }

    pub fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.delete::<Secret>(namespace, name)
    }

    pub fn list_endpoints(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Endpoints>, ClientError> {
        self.list(namespace, label_selector)
    }
}
