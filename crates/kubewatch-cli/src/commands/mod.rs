pub mod await_pod;
pub mod completions;
pub mod create_pod;
pub mod delete_pod;
pub mod get_secret;
pub mod list_endpoints;
pub mod list_pods;
pub mod logs;
pub mod man_pages;
pub mod set_image;
pub mod watch_pod;

use indicatif::{ProgressBar, ProgressStyle};
use kubewatch_client::api::{Pod, PodPhase};
use kubewatch_client::config::default_config_path;
use kubewatch_client::{Client, ClientConfig, ClientError, WaitError};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_NOT_READY: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;
/// Interrupted by Ctrl-C, as a shell reports SIGINT.
pub const EXIT_CANCELLED: u8 = 130;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_phase(phase: Option<PodPhase>) -> String {
    use console::Style;
    let Some(phase) = phase else {
        return "-".to_owned();
    };
    let text = phase.to_string();
    match phase {
        PodPhase::Running => Style::new().green().apply_to(text).to_string(),
        PodPhase::Pending => Style::new().yellow().apply_to(text).to_string(),
        PodPhase::Succeeded => Style::new().cyan().apply_to(text).to_string(),
        PodPhase::Failed => Style::new().red().bold().apply_to(text).to_string(),
        PodPhase::Unknown => Style::new().dim().apply_to(text).to_string(),
    }
}

/// Short human-readable summary of a pod.
pub fn print_pod(pod: &Pod) {
    let status = pod.status.as_ref();
    println!("pod:      {}", pod.metadata.resource_ref());
    println!("phase:    {}", colorize_phase(pod.phase()));
    println!("pod_ip:   {}", status.and_then(|s| s.pod_ip.as_deref()).unwrap_or("-"));
    println!("node:     {}", pod.spec.node_name.as_deref().unwrap_or("-"));
    println!("version:  {}", pod.metadata.resource_version);
    if let Some(message) = status.and_then(|s| s.message.as_deref()) {
        println!("message:  {message}");
    }
}

/// Whether `err` comes from the caller's cancellation rather than a failure.
pub fn is_cancelled(err: &ClientError) -> bool {
    match err {
        ClientError::Wait(WaitError::Cancelled) => true,
        ClientError::NotReady { source, .. } => is_cancelled(source),
        _ => false,
    }
}

fn config_error(err: &ClientError) -> String {
    match err {
        ClientError::Config(_) => err.to_string(),
        other => format!("client config error: {other}"),
    }
}

/// Work out the client config.
///
/// The host comes from `--host`, then the environment, then the config file;
/// timeouts come from the config file when there is one.
pub fn resolve_config(host: Option<&str>, config_path: Option<&Path>) -> Result<ClientConfig, String> {
    let from_file = match config_path {
        Some(path) if path.exists() => Some(ClientConfig::load(path).map_err(|e| config_error(&e))?),
        _ => None,
    };
    let host = match host {
        Some(host) => host.to_owned(),
        None => match (ClientConfig::from_env(), &from_file) {
            (Ok(env), _) => env.host,
            (Err(_), Some(file)) => file.host.clone(),
            (Err(e), None) => return Err(format!("{}; pass --host", config_error(&e))),
        },
    };
    let mut config = from_file.unwrap_or_else(|| ClientConfig::new(&host));
    config.host = host.trim_end_matches('/').to_owned();
    Ok(config)
}

pub fn make_client(host: Option<&str>) -> Result<Client, String> {
    let path = default_config_path().ok();
    let config = resolve_config(host, path.as_deref())?;
    tracing::debug!("using API server {}", config.host);
    Ok(Client::new(config))
}
