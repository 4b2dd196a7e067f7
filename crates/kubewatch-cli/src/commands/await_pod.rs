use super::{
    is_cancelled, json_pretty, make_client, print_pod, spin_fail, spin_ok, spinner, EXIT_SUCCESS,
};
use kubewatch_client::api::{ResourceRef, ResourceVersion};
use kubewatch_client::{CancelToken, ClientError};
use std::time::Duration;

pub fn run(
    host: Option<&str>,
    namespace: &str,
    name: &str,
    resource_version: &str,
    timeout_secs: Option<u64>,
    cancel: &CancelToken,
    json: bool,
) -> Result<u8, String> {
    let client = make_client(host)?;
    let timeout = timeout_secs.map_or(client.await_timeout(), Duration::from_secs);
    let reference = ResourceRef::new(namespace, name);

    let pb = spinner(&format!("waiting for pod {reference}…"));
    let pod = client
        .await_pod_not_pending(
            &reference,
            &ResourceVersion::new(resource_version),
            timeout,
            cancel,
        )
        .map_err(|e| {
            if is_cancelled(&e) {
                spin_fail(&pb, "cancelled");
                return format!("cancelled while waiting for Pod {reference}");
            }
            spin_fail(&pb, &format!("pod {reference} is still pending"));
            match e {
                ClientError::Wait(wait) => {
                    format!("timed out waiting for Pod {reference} to become ready: {wait}")
                }
                other => other.to_string(),
            }
        })?;
    spin_ok(&pb, &format!("pod {reference} left Pending"));

    if json {
        println!("{}", json_pretty(&pod)?);
    } else {
        print_pod(&pod);
    }
    Ok(EXIT_SUCCESS)
}
