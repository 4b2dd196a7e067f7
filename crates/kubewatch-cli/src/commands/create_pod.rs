use super::{
    is_cancelled, json_pretty, make_client, print_pod, spin_fail, spin_ok, spinner, EXIT_SUCCESS,
};
use kubewatch_client::api::Pod;
use kubewatch_client::CancelToken;
use std::path::Path;
use std::time::Duration;

pub fn run(
    host: Option<&str>,
    file: &Path,
    namespace: Option<&str>,
    timeout_secs: Option<u64>,
    cancel: &CancelToken,
    json: bool,
) -> Result<u8, String> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
    let mut pod: Pod = serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse pod definition {}: {e}", file.display()))?;
    if let Some(ns) = namespace {
        pod.metadata.namespace = ns.into();
    }

    let client = make_client(host)?;
    let timeout = timeout_secs.map_or(client.await_timeout(), Duration::from_secs);
    let reference = pod.metadata.resource_ref();

    let pb = spinner(&format!("creating pod {reference}…"));
    let ready = client
        .create_pod_with_timeout(&pod, timeout, cancel)
        .map_err(|e| {
            if is_cancelled(&e) {
                spin_fail(&pb, "cancelled");
                return format!("cancelled while waiting for Pod {reference}");
            }
            spin_fail(&pb, &format!("pod {reference} did not start"));
            e.to_string()
        })?;
    spin_ok(&pb, &format!("pod {reference} left Pending"));

    if json {
        println!("{}", json_pretty(&ready)?);
    } else {
        print_pod(&ready);
    }
    Ok(EXIT_SUCCESS)
}
