use crate::meta::ObjectMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Coarse lifecycle status of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Also used for any phase string this client does not know.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Fields not modelled here (ports, env, resources, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PodPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, rename = "hostIP", skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(default, rename = "podIP", skip_serializing_if = "Option::is_none")]
    pub pod_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default = "pod_api_version")]
    pub api_version: String,
    #[serde(default = "pod_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PodStatus>,
}

fn pod_api_version() -> String {
    "v1".to_owned()
}

fn pod_kind() -> String {
    "Pod".to_owned()
}

impl Pod {
    pub fn new(metadata: ObjectMeta, spec: PodSpec) -> Self {
        Self {
            api_version: pod_api_version(),
            kind: pod_kind(),
            metadata,
            spec,
            status: None,
        }
    }

    /// The observed phase, if the server has reported one.
    pub fn phase(&self) -> Option<PodPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }
}

/// Pod template embedded in controllers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_decodes_known_and_unknown_strings() {
        let p: PodPhase = serde_json::from_str("\"Running\"").unwrap();
        assert_eq!(p, PodPhase::Running);
        let p: PodPhase = serde_json::from_str("\"Evicted\"").unwrap();
        assert_eq!(p, PodPhase::Unknown);
    }

    #[test]
    fn pod_without_status_has_no_phase() {
        let pod: Pod = serde_json::from_str(r#"{"metadata":{"name":"p"}}"#).unwrap();
        assert_eq!(pod.phase(), None);
        assert_eq!(pod.kind, "Pod");
    }

    #[test]
    fn unmodelled_spec_fields_survive_reencode() {
        let json = r#"{"metadata":{"name":"p"},"spec":{"containers":[{"name":"c","image":"busybox","env":[{"name":"A","value":"1"}]}],"dnsPolicy":"ClusterFirst"}}"#;
        let pod: Pod = serde_json::from_str(json).unwrap();
        let value = serde_json::to_value(&pod).unwrap();
        assert_eq!(value["spec"]["dnsPolicy"], "ClusterFirst");
        assert_eq!(value["spec"]["containers"][0]["env"][0]["value"], "1");
    }

    #[test]
    fn status_ip_fields_use_upper_case_suffix() {
        let json = r#"{"phase":"Running","podIP":"10.0.0.7","hostIP":"192.168.1.2"}"#;
        let status: PodStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.pod_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(status.host_ip.as_deref(), Some("192.168.1.2"));
    }
}
