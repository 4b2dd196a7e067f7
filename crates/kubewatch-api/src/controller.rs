use crate::meta::ObjectMeta;
use crate::pod::PodTemplateSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationControllerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationControllerStatus {
    #[serde(default)]
    pub replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationController {
    #[serde(default = "rc_api_version")]
    pub api_version: String,
    #[serde(default = "rc_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReplicationControllerSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReplicationControllerStatus>,
}

fn rc_api_version() -> String {
    "v1".to_owned()
}

fn rc_kind() -> String {
    "ReplicationController".to_owned()
}

impl ReplicationController {
    pub fn new(metadata: ObjectMeta, spec: ReplicationControllerSpec) -> Self {
        Self {
            api_version: rc_api_version(),
            kind: rc_kind(),
            metadata,
            spec,
            status: None,
        }
    }

    /// Image of the first container in the pod template, if any.
    pub fn first_image(&self) -> Option<&str> {
        self.spec
            .template
            .as_ref()
            .and_then(|t| t.spec.containers.first())
            .map(|c| c.image.as_str())
    }
}
