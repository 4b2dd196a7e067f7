use super::{json_pretty, make_client, EXIT_SUCCESS};

pub fn run(
    host: Option<&str>,
    namespace: &str,
    selector: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let client = make_client(host)?;
    let endpoints = client
        .list_endpoints(namespace, selector)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&endpoints)?);
    } else if endpoints.is_empty() {
        println!("no endpoints found in {namespace}");
    } else {
        println!("{:<32} ENDPOINTS", "NAME");
        for ep in &endpoints {
            let addrs = ep.socket_addrs();
            let shown = if addrs.is_empty() {
                "<none>".to_owned()
            } else {
                addrs.join(",")
            };
            println!("{:<32} {shown}", ep.metadata.name);
        }
    }
    Ok(EXIT_SUCCESS)
}
