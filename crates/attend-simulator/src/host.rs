//! Desktop implementations of the terminal's collaborators

use std::io::{self, Read};
use std::time::{Duration, Instant};

use attend_core::console::OperatorConsole;
use attend_core::http::{HttpResponse, MAX_BODY_LEN};
use attend_core::report::{Uplink, UplinkError};
use attend_core::time::Clock;
use log::{debug, warn};
use reqwest::blocking::Client;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Wall clock; sleeping blocks the (single) simulator thread.
pub struct StdClock {
    started: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    async fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Operator console on stdin; closes at end of input.
pub struct StdinConsole {
    stdin: io::Stdin,
}

impl StdinConsole {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for StdinConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorConsole for StdinConsole {
    async fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.stdin.lock().read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(e) => {
                warn!("stdin read failed: {}", e);
                None
            }
        }
    }
}

/// HTTP(S) uplink on a blocking `reqwest` client; `offline` simulates a
/// dropped WiFi link.
pub struct HttpUplink {
    client: Client,
    offline: bool,
}

impl HttpUplink {
    pub fn new(offline: bool) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, offline })
    }
}

impl Uplink for HttpUplink {
    fn is_connected(&self) -> bool {
        !self.offline
    }

    async fn post_json(&mut self, url: &str, body: &[u8]) -> Result<HttpResponse, UplinkError> {
        debug!("POST {} ({} bytes)", url, body.len());
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_vec())
            .send()
            .map_err(|e| {
                warn!("HTTP request failed: {}", e);
                UplinkError::Transport { operation: "send" }
            })?;

        let status = response.status().as_u16();
        let mut body = response
            .bytes()
            .map_err(|e| {
                warn!("Reading response body failed: {}", e);
                UplinkError::Transport { operation: "read" }
            })?
            .to_vec();
        body.truncate(MAX_BODY_LEN);

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned response and hand back the raw request.
    fn serve_once(response: &'static str) -> (String, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/fingerprint", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Read until the JSON body closes
            while !request.ends_with(b"}") {
                let read = stream.read(&mut buf).unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (url, handle)
    }

    #[test]
    fn test_post_json_returns_status_and_body() {
        let (url, server) =
            serve_once("HTTP/1.1 201 Created\r\nContent-Length: 5\r\nConnection: close\r\n\r\nsaved");
        let mut uplink = HttpUplink::new(false).unwrap();

        let response = block_on(uplink.post_json(&url, br#"{"template":"AAAA"}"#)).unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.body, b"saved");

        let request = String::from_utf8(server.join().unwrap()).unwrap();
        assert!(request.starts_with("POST /api/fingerprint HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"template":"AAAA"}"#));
    }

    #[test]
    fn test_refused_connection_is_transport_error() {
        // Bind and drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut uplink = HttpUplink::new(false).unwrap();

        let result = block_on(uplink.post_json(&format!("http://127.0.0.1:{}/api", port), b"{}"));
        assert_eq!(result, Err(UplinkError::Transport { operation: "send" }));
    }

    #[test]
    fn test_offline_uplink_reports_disconnected() {
        assert!(!HttpUplink::new(true).unwrap().is_connected());
        assert!(HttpUplink::new(false).unwrap().is_connected());
    }
}
