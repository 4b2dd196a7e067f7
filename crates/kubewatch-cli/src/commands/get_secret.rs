use super::{json_pretty, make_client, EXIT_SUCCESS};

pub fn run(host: Option<&str>, namespace: &str, name: &str, json: bool) -> Result<u8, String> {
    let client = make_client(host)?;
    let secret = client
        .get_secret(namespace, name)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&secret)?);
    } else {
        println!("name:  {}", secret.metadata.resource_ref());
        println!("type:  {}", secret.secret_type.as_deref().unwrap_or("Opaque"));
        println!("data:");
        for (key, value) in &secret.data {
            println!("  {key:<24} {} bytes (base64)", value.len());
        }
    }
    Ok(EXIT_SUCCESS)
}
