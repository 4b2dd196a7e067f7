use super::{colorize_phase, make_client, EXIT_SUCCESS};
use kubewatch_client::api::{EventType, ResourceRef, ResourceVersion};
use kubewatch_client::{CancelToken, WatchError, WatchEvent};

pub fn run(
    host: Option<&str>,
    namespace: &str,
    name: &str,
    resource_version: &str,
    cancel: &CancelToken,
    json: bool,
) -> Result<u8, String> {
    let client = make_client(host)?;
    let reference = ResourceRef::new(namespace, name);
    let watch = client
        .watch_pod(&reference, &ResourceVersion::new(resource_version), cancel)
        .map_err(|e| e.to_string())?;

    for event in watch {
        let kind = event.event_type().map_or("", EventType::as_str);
        let pod = match event {
            WatchEvent::Added(pod) | WatchEvent::Modified(pod) | WatchEvent::Deleted(pod) => pod,
            WatchEvent::Error(WatchError::Cancelled) => {
                eprintln!("watch of pod {reference} cancelled");
                return Ok(EXIT_SUCCESS);
            }
            WatchEvent::Error(err) => {
                return Err(format!("watch of pod {reference} failed: {err}"));
            }
        };
        if json {
            println!("{}", serde_json::json!({ "type": kind, "object": pod }));
        } else {
            println!(
                "{kind:<9} {:<32} {:<10} {}",
                pod.metadata.resource_ref().to_string(),
                colorize_phase(pod.phase()),
                pod.metadata.resource_version
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
