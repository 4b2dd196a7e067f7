use super::{json_pretty, make_client, EXIT_SUCCESS};

pub fn run(
    host: Option<&str>,
    namespace: &str,
    controller: &str,
    image: &str,
    version: &str,
    json: bool,
) -> Result<u8, String> {
    let client = make_client(host)?;
    let rc = client
        .update_replication_controller_image(namespace, controller, image, version)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&rc)?);
    } else {
        println!(
            "replicationcontroller {namespace}/{controller} image set to {}",
            rc.first_image().unwrap_or("<none>")
        );
    }
    Ok(EXIT_SUCCESS)
}
