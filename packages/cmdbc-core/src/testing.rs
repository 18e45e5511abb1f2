//! Minimal in-process CMDB server for exercising the HTTP paths in tests.
//!
//! Speaks just enough HTTP/1.1 for reqwest: one request per connection,
//! `Content-Length` bodies, `Connection: close` responses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::cloud::{ApiConfig, Session, SyncClient};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: String,
    path: String,
    status: u16,
    body: Vec<u8>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct State {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
}

pub(crate) struct MockServer {
    base_url: String,
    state: Arc<Mutex<State>>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State::default()));

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, state).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Answer `method path` with `status` and `body`, replacing any earlier route.
    pub fn route(&self, method: &str, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.add(Route {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: body.into(),
            delay: None,
        });
    }

    /// Like [`MockServer::route`], but hold the response headers back for `delay`.
    pub fn route_delayed(&self, method: &str, path: &str, status: u16, delay: Duration) {
        self.add(Route {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: Vec::new(),
            delay: Some(delay),
        });
    }

    /// Accept the authentication endpoint for `host`.
    pub fn allow_auth(&self, host: &str) {
        self.route("GET", &format!("/v1/cmdb/authenticate/{host}"), 200, "");
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last(&self, method: &str, path: &str) -> Option<RecordedRequest> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }

    /// Client configuration pointing at this server.
    pub fn api_config(&self, host: &str) -> ApiConfig {
        ApiConfig {
            server: self.base_url.clone(),
            username: "cmdbc".to_string(),
            password: "secret".to_string(),
            host_name: host.to_string(),
            header_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    pub fn client(&self, host: &str) -> SyncClient {
        let config = self.api_config(host);
        let session = Arc::new(Session::new(&config.client_id).unwrap());
        SyncClient::new(config, session)
    }

    fn add(&self, route: Route) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .retain(|r| !(r.method == route.method && r.path == route.path));
        state.routes.push(route);
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(header_end + content_length);
    let body = buf[header_end..body_end].to_vec();

    let route = {
        let mut state = state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            headers,
            body,
        });
        state
            .routes
            .iter()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    };

    let (status, body) = match route {
        Some(route) => {
            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }
            (route.status, route.body)
        }
        None => (404, Vec::new()),
    };

    let response = format!(
        "HTTP/1.1 {} MOCK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await
}
