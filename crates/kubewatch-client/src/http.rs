use crate::stream::{self, StreamConnection};
use crate::{ApiBackend, ClientConfig, ClientError};
use kubewatch_api::ResourceVersion;
use std::time::Duration;
use ureq::http::Response;
use ureq::Body;

/// HTTP backend talking to a real API server.
///
/// Request/response calls go through a shared `ureq::Agent`; each watch gets
/// its own agent from [`stream::open`] so it can be shut down from another
/// thread.
pub struct HttpBackend {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.request_timeout()))
            .build()
            .into();
        Self { config, agent }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.host)
    }

    fn delete_with_timeout(&self, path: &str, timeout: Option<Duration>) -> Result<(), ClientError> {
        let url = self.url(path);
        tracing::debug!("DELETE {url}");
        let mut req = self.agent.delete(&url);
        if let Some(timeout) = timeout {
            req = req.config().timeout_global(Some(timeout)).build();
        }
        finish("DELETE", &url, req.call(), &[200, 202]).map(|_| ())
    }
}

/// Read the body and map the status to a result.
fn finish(
    method: &'static str,
    url: &str,
    result: Result<Response<Body>, ureq::Error>,
    expected: &[u16],
) -> Result<Vec<u8>, ClientError> {
    let mut resp = result
        .map_err(|e| ClientError::Transport(format!("failed to make request: {method} {url:?}: {e}")))?;
    let status = resp.status().as_u16();
    let body = resp.body_mut().read_to_vec().map_err(|e| {
        ClientError::Transport(format!("failed to read response body: {method} {url:?}: {e}"))
    })?;
    if status == 404 {
        return Err(ClientError::NotFound(url.to_owned()));
    }
    if !expected.contains(&status) {
        return Err(ClientError::Status {
            method,
            url: url.to_owned(),
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(body)
}

impl ApiBackend for HttpBackend {
    fn create(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, ClientError> {
        let url = self.url(path);
        tracing::debug!("POST {url} ({} bytes)", body.len());
        let result = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(body);
        finish("POST", &url, result, &[201])
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.url(path);
        tracing::debug!("GET {url}");
        finish("GET", &url, self.agent.get(&url).call(), &[200])
    }

    fn list(&self, path: &str, label_selector: Option<&str>) -> Result<Vec<u8>, ClientError> {
        let url = self.url(path);
        tracing::debug!("GET {url} (selector: {label_selector:?})");
        let mut req = self.agent.get(&url);
        if let Some(selector) = label_selector {
            req = req.query("labelSelector", selector);
        }
        finish("GET", &url, req.call(), &[200])
    }

    fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.delete_with_timeout(path, None)
    }

    fn delete_detached(&self, path: &str) -> Result<(), ClientError> {
        self.delete_with_timeout(path, Some(self.config.cleanup_timeout()))
    }

    fn patch(&self, path: &str, content_type: &str, body: &[u8]) -> Result<Vec<u8>, ClientError> {
        let url = self.url(path);
        tracing::debug!("PATCH {url} ({content_type})");
        let result = self
            .agent
            .patch(&url)
            .header("Content-Type", content_type)
            .send(body);
        finish("PATCH", &url, result, &[200])
    }

    fn open_stream(
        &self,
        path: &str,
        resource_version: &ResourceVersion,
    ) -> Result<StreamConnection, ClientError> {
        let url = self.url(path);
        tracing::debug!("GET {url} (watch from {resource_version})");
        stream::open(&url, resource_version, self.config.connect_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    /// Answers every request with the same canned status and body.
    struct MockServer {
        addr: String,
        requests: Arc<Mutex<Vec<CapturedRequest>>>,
    }

    impl MockServer {
        fn start(status: u16, reason: &'static str, body: &'static str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", listener.local_addr().unwrap());
            let requests: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));
            let reqs = Arc::clone(&requests);

            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let mut reader = BufReader::new(stream.try_clone().unwrap());
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).is_err() {
                        continue;
                    }
                    let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
                    if parts.len() < 2 {
                        continue;
                    }
                    let mut headers = HashMap::new();
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                            break;
                        }
                        if let Some((k, v)) = line.trim().split_once(": ") {
                            headers.insert(k.to_lowercase(), v.to_owned());
                        }
                    }
                    let len = headers
                        .get("content-length")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let mut req_body = vec![0u8; len];
                    let _ = reader.read_exact(&mut req_body);

                    reqs.lock().unwrap().push(CapturedRequest {
                        method: parts[0].to_owned(),
                        path: parts[1].to_owned(),
                        headers,
                        body: req_body,
                    });

                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes());
                    let _ = stream.flush();
                }
            });

            MockServer { addr, requests }
        }

        fn captured(&self) -> Vec<CapturedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn backend(url: &str) -> HttpBackend {
        HttpBackend::new(ClientConfig::new(url))
    }

    #[test]
    fn create_posts_json_and_accepts_201() {
        let server = MockServer::start(
            201,
            "Created",
            r#"{"metadata":{"name":"p","resourceVersion":"9"}}"#,
        );
        let out = backend(&server.addr)
            .create("/api/v1/namespaces/default/pods", br#"{"metadata":{"name":"p"}}"#)
            .unwrap();
        // The server's answer comes back, not the request that was sent.
        assert_eq!(out, br#"{"metadata":{"name":"p","resourceVersion":"9"}}"#);

        let reqs = server.captured();
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(reqs[0].path, "/api/v1/namespaces/default/pods");
        assert_eq!(
            reqs[0].headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(reqs[0].body, br#"{"metadata":{"name":"p"}}"#);
    }

    #[test]
    fn create_with_200_is_status_error() {
        let server = MockServer::start(200, "OK", "{}");
        let err = backend(&server.addr)
            .create("/api/v1/namespaces/default/pods", b"{}")
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 200, method: "POST", .. }));
    }

    #[test]
    fn list_sends_label_selector() {
        let server = MockServer::start(200, "OK", r#"{"items":[]}"#);
        backend(&server.addr)
            .list("/api/v1/namespaces/default/pods", Some("app=web"))
            .unwrap();
        let reqs = server.captured();
        let (path, query) = reqs[0].path.split_once('?').unwrap();
        assert_eq!(path, "/api/v1/namespaces/default/pods");
        assert!(query.starts_with("labelSelector=app"));
    }

    #[test]
    fn get_404_is_not_found() {
        let server = MockServer::start(404, "Not Found", "{}");
        let err = backend(&server.addr)
            .get("/api/v1/namespaces/default/secrets/missing")
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[test]
    fn delete_error_carries_body() {
        let server = MockServer::start(409, "Conflict", "being deleted");
        let err = backend(&server.addr)
            .delete_detached("/api/v1/namespaces/default/pods/p")
            .unwrap_err();
        match err {
            ClientError::Status { status, body, method, .. } => {
                assert_eq!(status, 409);
                assert_eq!(method, "DELETE");
                assert_eq!(body, "being deleted");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn patch_sends_content_type() {
        let server = MockServer::start(200, "OK", "{}");
        backend(&server.addr)
            .patch(
                "/api/v1/namespaces/default/replicationcontrollers/web",
                "application/json-patch+json",
                b"[]",
            )
            .unwrap();
        let reqs = server.captured();
        assert_eq!(reqs[0].method, "PATCH");
        assert_eq!(
            reqs[0].headers.get("content-type").map(String::as_str),
            Some("application/json-patch+json")
        );
    }

    #[test]
    fn open_stream_sends_resource_version() {
        let server = MockServer::start(200, "OK", "{\"type\":\"ADDED\",\"object\":{}}\n");
        let mut conn = backend(&server.addr)
            .open_stream(
                "/api/v1/watch/namespaces/default/pods/p",
                &ResourceVersion::new("42"),
            )
            .unwrap();
        let mut body = String::new();
        conn.body.read_to_string(&mut body).unwrap();
        assert!(body.starts_with("{\"type\":\"ADDED\""));

        let reqs = server.captured();
        assert_eq!(reqs[0].method, "GET");
        assert_eq!(
            reqs[0].path,
            "/api/v1/watch/namespaces/default/pods/p?resourceVersion=42"
        );
    }

    #[test]
    fn connection_refused_is_transport_error() {
        let err = backend("http://127.0.0.1:1")
            .get("/api/v1/namespaces/default/pods/p")
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
