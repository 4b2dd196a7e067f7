use super::{make_client, EXIT_SUCCESS};

pub fn run(host: Option<&str>, namespace: &str, name: &str) -> Result<u8, String> {
    let client = make_client(host)?;
    let log = client.pod_log(namespace, name).map_err(|e| e.to_string())?;
    print!("{log}");
    Ok(EXIT_SUCCESS)
}
