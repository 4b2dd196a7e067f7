use super::{colorize_phase, json_pretty, make_client, EXIT_SUCCESS};

pub fn run(
    host: Option<&str>,
    namespace: &str,
    selector: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let client = make_client(host)?;
    let pods = client
        .list_pods(namespace, selector)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&pods)?);
    } else if pods.is_empty() {
        println!("no pods found in {namespace}");
    } else {
        println!("{:<32} {:<10} {:<16} NODE", "NAME", "PHASE", "POD_IP");
        for pod in &pods {
            let status = pod.status.as_ref();
            println!(
                "{:<32} {:<10} {:<16} {}",
                pod.metadata.name,
                colorize_phase(pod.phase()),
                status.and_then(|s| s.pod_ip.as_deref()).unwrap_or("-"),
                pod.spec.node_name.as_deref().unwrap_or("-"),
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
