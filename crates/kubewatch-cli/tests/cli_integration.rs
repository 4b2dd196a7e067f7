//! CLI subprocess integration tests.
//!
//! These tests invoke the `kubewatch` binary as a subprocess against a small
//! in-process API server and verify exit codes and output.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn kubewatch_bin(home: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kubewatch"));
    // Keep the user's config file and cluster environment out of the way.
    cmd.env("HOME", home)
        .env_remove("KUBEWATCH_HOST")
        .env_remove("KUBERNETES_SERVICE_HOST")
        .env_remove("KUBERNETES_SERVICE_PORT")
        .env_remove("KUBEWATCH_LOG");
    cmd
}

/// Serves `POST` pods with a resourceVersion, a watch stream made of
/// `watch_records`, `DELETE` and a fixed pod list.
struct ApiServer {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ApiServer {
    /// The watch stream ends after its records.
    fn start(watch_records: Vec<String>) -> Self {
        Self::spawn(watch_records, false)
    }

    /// The watch stream stays open after its records until the client leaves.
    fn start_hanging(watch_records: Vec<String>) -> Self {
        Self::spawn(watch_records, true)
    }

    fn spawn(watch_records: Vec<String>, hang_watch: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let reqs = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let reqs = Arc::clone(&reqs);
                let records = watch_records.clone();
                thread::spawn(move || serve(stream, &reqs, &records, hang_watch));
            }
        });
        Self { url, requests }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn wait_for_request(&self, prefix: &str, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.requests().iter().any(|r| r.starts_with(prefix)) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

fn serve(
    mut stream: TcpStream,
    requests: &Mutex<Vec<String>>,
    records: &[String],
    hang_watch: bool,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
            break;
        }
        if let Some((k, v)) = line.trim().split_once(':') {
            if k.eq_ignore_ascii_case("content-length") {
                content_length = v.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    let _ = reader.read_exact(&mut body);

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let target = parts.next().unwrap_or_default().to_owned();
    requests.lock().unwrap().push(format!("{method} {target}"));

    let (status, payload) = match method.as_str() {
        "POST" => {
            let mut object: serde_json::Value = serde_json::from_slice(&body).unwrap();
            object["metadata"]["resourceVersion"] = "5".into();
            ("201 Created", object.to_string())
        }
        "DELETE" => ("200 OK", "{}".to_owned()),
        "GET" if hang_watch && target.starts_with("/api/v1/watch/") => {
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n",
            );
            for record in records {
                let line = format!("{record}\n");
                let _ = stream.write_all(format!("{:x}\r\n{line}\r\n", line.len()).as_bytes());
            }
            let _ = stream.flush();
            let mut sink = [0u8; 64];
            while matches!(reader.read(&mut sink), Ok(n) if n > 0) {}
            return;
        }
        "GET" if target.starts_with("/api/v1/watch/") => {
            let mut out = String::new();
            for record in records {
                out.push_str(record);
                out.push('\n');
            }
            ("200 OK", out)
        }
        "GET" if target.starts_with("/api/v1/namespaces/default/pods") => (
            "200 OK",
            r#"{"metadata":{},"items":[{"metadata":{"name":"web-0","namespace":"default"},"status":{"phase":"Running","podIP":"10.0.0.7"}}]}"#
                .to_owned(),
        ),
        _ => ("404 Not Found", r#"{"reason":"NotFound"}"#.to_owned()),
    };
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

fn pod_record(kind: &str, phase: &str) -> String {
    format!(
        r#"{{"type":"{kind}","object":{{"metadata":{{"name":"web-0","namespace":"default","resourceVersion":"6"}},"status":{{"phase":"{phase}"}}}}}}"#
    )
}

fn write_pod_file(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("pod.json");
    std::fs::write(
        &path,
        r#"{"metadata":{"name":"web-0"},"spec":{"containers":[{"name":"app","image":"web:1"}]}}"#,
    )
    .unwrap();
    path
}

#[test]
fn cli_version_exits_zero() {
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path()).arg("--version").output().unwrap();
    assert!(output.status.success(), "kubewatch --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("kubewatch"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["create-pod", "await-pod", "watch-pod", "list-pods", "set-image"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn cli_without_host_is_config_error() {
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path()).arg("list-pods").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("client config error"), "stderr: {stderr}");
}

#[test]
fn cli_list_pods_json() {
    let server = ApiServer::start(vec![]);
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path())
        .args(["--host", &server.url, "--json", "list-pods"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let pods: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(pods[0]["metadata"]["name"], "web-0");
    assert_eq!(pods[0]["status"]["phase"], "Running");
}

#[test]
fn cli_host_from_environment() {
    let server = ApiServer::start(vec![]);
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path())
        .env("KUBEWATCH_HOST", &server.url)
        .arg("list-pods")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("web-0"));
}

#[test]
fn cli_create_pod_succeeds_when_running() {
    let server = ApiServer::start(vec![pod_record("ADDED", "Pending"), pod_record("MODIFIED", "Running")]);
    let home = tempfile::tempdir().unwrap();
    let pod_file = write_pod_file(home.path());
    let output = kubewatch_bin(home.path())
        .args(["--host", &server.url, "--json", "create-pod"])
        .arg(&pod_file)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let pod: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(pod["status"]["phase"], "Running");
    assert!(!server.requests().iter().any(|r| r.starts_with("DELETE")));
}

#[test]
fn cli_create_pod_not_ready_exits_two_and_cleans_up() {
    let server = ApiServer::start(vec![pod_record("ADDED", "Pending")]);
    let home = tempfile::tempdir().unwrap();
    let pod_file = write_pod_file(home.path());
    let output = kubewatch_bin(home.path())
        .args(["--host", &server.url, "create-pod", "--timeout", "10"])
        .arg(&pod_file)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("timed out waiting for Pod default/web-0"), "stderr: {stderr}");
    let deletes: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.starts_with("DELETE"))
        .collect();
    assert_eq!(deletes, vec!["DELETE /api/v1/namespaces/default/pods/web-0".to_owned()]);
}

#[test]
fn cli_await_pod_without_version_fails() {
    let server = ApiServer::start(vec![]);
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path())
        .args(["--host", &server.url, "await-pod", "web-0", "--resource-version", ""])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("must be provided"));
    assert!(server.requests().is_empty());
}

#[test]
fn cli_watch_pod_prints_events() {
    let server = ApiServer::start(vec![pod_record("MODIFIED", "Running"), pod_record("DELETED", "Succeeded")]);
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path())
        .args(["--host", &server.url, "--json", "watch-pod", "web-0", "--resource-version", "5"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let types: Vec<String> = stdout
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["type"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(types, vec!["MODIFIED", "DELETED"]);
}

#[test]
fn cli_create_pod_missing_file_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path())
        .args(["--host", "http://127.0.0.1:1", "create-pod", "/nonexistent/pod.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn cli_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    let output = kubewatch_bin(home.path())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("kubewatch"));
}

#[cfg(unix)]
#[test]
fn cli_create_pod_ctrl_c_is_cancelled_and_cleans_up() {
    let server = ApiServer::start_hanging(vec![pod_record("ADDED", "Pending")]);
    let home = tempfile::tempdir().unwrap();
    let pod_file = write_pod_file(home.path());
    let child = kubewatch_bin(home.path())
        .args(["--host", &server.url, "create-pod", "--timeout", "60"])
        .arg(&pod_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    assert!(
        server.wait_for_request("GET /api/v1/watch/", Duration::from_secs(10)),
        "watch was never opened"
    );

    let kill = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(kill.success());
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(130));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cancelled while waiting for Pod default/web-0"),
        "stderr: {stderr}"
    );
    assert!(!stderr.contains("timed out"), "stderr: {stderr}");
    let deletes = server
        .requests()
        .into_iter()
        .filter(|r| r.starts_with("DELETE"))
        .count();
    assert_eq!(deletes, 1);
}
