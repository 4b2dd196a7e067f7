use super::{json_pretty, make_client, EXIT_SUCCESS};

pub fn run(host: Option<&str>, namespace: &str, name: &str, json: bool) -> Result<u8, String> {
    let client = make_client(host)?;
    client
        .delete_pod(namespace, name)
        .map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "deleted": format!("{namespace}/{name}") });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("deleted pod {namespace}/{name}");
    }
    Ok(EXIT_SUCCESS)
}
