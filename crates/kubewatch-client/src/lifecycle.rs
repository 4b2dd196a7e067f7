//! Create-then-await with compensating cleanup.
//!
//! [`Client::create_and_await`] owns the object it creates until the object is
//! ready. If the wait fails for any reason the object is deleted again, once,
//! and the wait failure is what the caller sees.

use crate::cancel::CancelToken;
use crate::resource::Resource;
use crate::wait::{await_condition, pod_not_pending};
use crate::{Client, ClientError};
use kubewatch_api::{Pod, ResourceRef, ResourceVersion};
use std::time::Duration;
use tracing::{info, warn};

impl Client {
    /// Create `object` and block until `ready` holds for it.
    ///
    /// On failure after the create succeeded, a single detached delete is
    /// issued and [`ClientError::NotReady`] wraps the original cause. A failed
    /// delete is only logged.
    pub fn create_and_await<R, F>(
        &self,
        object: &R,
        timeout: Duration,
        cancel: &CancelToken,
        ready: F,
    ) -> Result<R, ClientError>
    where
        R: Resource,
        F: FnMut(&R) -> bool,
    {
        let created = self.create(object)?;
        let meta = created.metadata();
        let namespace = if meta.namespace.is_empty() {
            object.metadata().namespace_or_default()
        } else {
            meta.namespace.as_str()
        };
        let name = if meta.name.is_empty() {
            &object.metadata().name
        } else {
            &meta.name
        };
        let reference = ResourceRef::new(namespace, name.clone());

        match self.await_resource(&reference, &meta.resource_version, timeout, cancel, ready) {
            Ok(ready) => {
                info!("{} {reference} is ready", R::KIND);
                Ok(ready)
            }
            Err(err) => {
                warn!("{} {reference} did not become ready: {err}; deleting it", R::KIND);
                let path = R::item_path(&reference.namespace, &reference.name);
                if let Err(cleanup) = self.backend().delete_detached(&path) {
                    warn!("failed to delete {} {reference}: {cleanup}", R::KIND);
                }
                Err(ClientError::NotReady {
                    kind: R::KIND,
                    name: reference.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    /// Watch an existing object until `ready` holds, then stop the watch.
    pub fn await_resource<R, F>(
        &self,
        reference: &ResourceRef,
        resource_version: &ResourceVersion,
        timeout: Duration,
        cancel: &CancelToken,
        ready: F,
    ) -> Result<R, ClientError>
    where
        R: Resource,
        F: FnMut(&R) -> bool,
    {
        let watch = self.watch::<R>(reference, resource_version, cancel)?;
        let result = await_condition(&watch, ready, timeout);
        watch.stop();
        Ok(result?)
    }

    /// Create a pod and wait, up to the configured await timeout, for it to
    /// leave `Pending`.
    pub fn create_pod(&self, pod: &Pod, cancel: &CancelToken) -> Result<Pod, ClientError> {
        self.create_pod_with_timeout(pod, self.await_timeout(), cancel)
    }

    pub fn create_pod_with_timeout(
        &self,
        pod: &Pod,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Pod, ClientError> {
        self.create_and_await(pod, timeout, cancel, pod_not_pending)
    }

    pub fn await_pod_not_pending(
        &self,
        reference: &ResourceRef,
        resource_version: &ResourceVersion,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Pod, ClientError> {
        self.await_resource(reference, resource_version, timeout, cancel, pod_not_pending)
    }
}
