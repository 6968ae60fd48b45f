//! In-process HTTP test double for the push endpoints
//!
//! Records every request (gunzipping bodies where needed) and answers with
//! configured status codes: 200 for `/ready` by default, and one fixed
//! status for everything else.

use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode the body as JSON, gunzipping first when the request says so
    pub fn json(&self) -> serde_json::Value {
        let bytes = if self.header("content-encoding") == Some("gzip") {
            let mut out = Vec::new();
            GzDecoder::new(self.body.as_slice())
                .read_to_end(&mut out)
                .expect("gunzip request body");
            out
        } else {
            self.body.clone()
        };
        serde_json::from_slice(&bytes).expect("request body is JSON")
    }
}

pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    /// Server that is ready and answers every push with `push_status`
    pub fn start(push_status: u16) -> Self {
        Self::start_with(200, push_status)
    }

    pub fn start_with(ready_status: u16, push_status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        listener
            .set_nonblocking(true)
            .expect("nonblocking listener");
        let addr = listener.local_addr().expect("listener address");

        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let requests = Arc::clone(&requests);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    match listener.accept() {
                        Ok((stream, _)) => {
                            let requests = Arc::clone(&requests);
                            let stop = Arc::clone(&stop);
                            thread::spawn(move || {
                                handle_connection(stream, requests, ready_status, push_status, stop)
                            });
                        }
                        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        TestServer {
            addr,
            requests,
            stop,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// All recorded requests except readiness probes
    pub fn pushes(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path != "/ready")
            .cloned()
            .collect()
    }

    pub fn push_count(&self) -> usize {
        self.pushes().len()
    }

    pub fn ready_probe_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == "/ready")
            .count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_connection(
    stream: TcpStream,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    ready_status: u16,
    push_status: u16,
    stop: Arc<AtomicBool>,
) {
    stream
        .set_read_timeout(Some(Duration::from_millis(100)))
        .ok();
    let mut writer = match stream.try_clone() {
        Ok(clone) => clone,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);

    // One connection may carry several requests (the client pools
    // connections); keep serving until EOF or shutdown.
    loop {
        let mut request_line = String::new();
        match reader.read_line(&mut request_line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                continue;
            }
        }

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => return,
                Ok(_) => {}
                Err(_) => return,
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_string();
                let value = value.trim().to_string();
                if key.eq_ignore_ascii_case("content-length") {
                    content_length = value.parse().unwrap_or(0);
                }
                headers.push((key, value));
            }
        }

        let mut body = vec![0u8; content_length];
        if content_length > 0 && reader.read_exact(&mut body).is_err() {
            return;
        }

        let status = if path == "/ready" {
            ready_status
        } else {
            push_status
        };

        requests.lock().unwrap().push(RecordedRequest {
            method,
            path,
            headers,
            body,
        });

        let reason = match status {
            200 => "OK",
            204 => "No Content",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        };
        if write!(
            writer,
            "HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n",
            status, reason
        )
        .is_err()
        {
            return;
        }
        if writer.flush().is_err() {
            return;
        }
    }
}
