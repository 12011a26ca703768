//! Minimal HTTP/1.1 mock of the order-delivery API for integration tests.
//!
//! Serves the order list, order details (honouring `runfilter`), model runs and
//! file bodies. File requests can be made to fail always or for the first N
//! hits. Every request without auth headers gets a 401. Each connection serves
//! one request and is closed.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::json;

#[derive(Debug, Clone, Copy)]
enum Fault {
    Always(u32),
    FirstN { remaining: usize, status: u32 },
}

#[derive(Default)]
struct MockState {
    /// (order id, model id, required runs)
    orders: Vec<(String, String, Vec<String>)>,
    files: HashMap<String, Vec<String>>,
    /// model id -> (run, runDateTime)
    runs: HashMap<String, (String, String)>,
    broken_details: Vec<String>,
    faults: Mutex<HashMap<String, Fault>>,
    hits: Mutex<HashMap<String, usize>>,
}

#[derive(Default)]
pub struct MockApiBuilder {
    state: MockState,
}

impl MockApiBuilder {
    pub fn order(mut self, order_id: &str, model_id: &str, runs: &[&str]) -> Self {
        self.state.orders.push((
            order_id.to_string(),
            model_id.to_string(),
            runs.iter().map(|r| r.to_string()).collect(),
        ));
        self
    }

    pub fn files(mut self, order_id: &str, file_ids: &[&str]) -> Self {
        self.state.files.insert(
            order_id.to_string(),
            file_ids.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn latest_run(mut self, model_id: &str, run: &str, run_date_time: &str) -> Self {
        self.state
            .runs
            .insert(model_id.to_string(), (run.to_string(), run_date_time.to_string()));
        self
    }

    /// Order details for `order_id` answer 500.
    pub fn broken_details(mut self, order_id: &str) -> Self {
        self.state.broken_details.push(order_id.to_string());
        self
    }

    pub fn fail_always(self, file_id: &str, status: u32) -> Self {
        self.state
            .faults
            .lock()
            .unwrap()
            .insert(file_id.to_string(), Fault::Always(status));
        self
    }

    pub fn fail_first(self, file_id: &str, times: usize, status: u32) -> Self {
        self.state.faults.lock().unwrap().insert(
            file_id.to_string(),
            Fault::FirstN {
                remaining: times,
                status,
            },
        );
        self
    }

    /// Starts the server in a background thread. It runs until the process exits.
    pub fn start(self) -> MockApi {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(self.state);
        let server_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&server_state);
                thread::spawn(move || handle(stream, &state));
            }
        });
        MockApi {
            base_url: format!("http://127.0.0.1:{}/", port),
            state,
        }
    }
}

pub struct MockApi {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockApi {
    pub fn builder() -> MockApiBuilder {
        MockApiBuilder::default()
    }

    /// Requests seen for a path (query string excluded), e.g. `/runs/mo-global`.
    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    /// Body served for a file id.
    pub fn body_of(file_id: &str) -> Vec<u8> {
        format!("GRIB{}7777", file_id).into_bytes()
    }
}

struct Request {
    path: String,
    query: HashMap<String, String>,
    authed: bool,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    let text = String::from_utf8_lossy(&data);
    let mut lines = text.lines();
    let target = lines.next()?.split_whitespace().nth(1)?.to_string();
    let mut authed = false;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            if (name == "x-api-key" || name == "x-ibm-client-id") && !value.trim().is_empty() {
                authed = true;
            }
        }
    }
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q),
        None => (target.clone(), ""),
    };
    let query = query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Some(Request {
        path,
        query,
        authed,
    })
}

fn respond(stream: &mut TcpStream, status: u32, reason: &str, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nX-RateLimit-Limit: 100\r\nX-RateLimit-Remaining: 99\r\nConnection: close\r\n\r\n",
        status,
        reason,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn reason_for(status: u32) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

fn respond_status(stream: &mut TcpStream, status: u32) {
    respond(stream, status, reason_for(status), "text/plain", b"");
}

fn respond_json(stream: &mut TcpStream, value: serde_json::Value) {
    respond(stream, 200, "OK", "application/json", value.to_string().as_bytes());
}

fn handle(mut stream: TcpStream, state: &MockState) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    *state.hits.lock().unwrap().entry(req.path.clone()).or_insert(0) += 1;
    if !req.authed {
        respond_status(&mut stream, 401);
        return;
    }

    let segments: Vec<&str> = req.path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["orders"] => {
            let orders: Vec<_> = state
                .orders
                .iter()
                .map(|(id, model, runs)| {
                    json!({ "orderId": id, "name": id, "modelId": model, "requiredLatestRuns": runs })
                })
                .collect();
            respond_json(&mut stream, json!({ "orders": orders }));
        }
        ["orders", order, "latest"] => {
            if state.broken_details.iter().any(|o| o.as_str() == *order) {
                respond_status(&mut stream, 500);
                return;
            }
            let Some(files) = state.files.get(*order) else {
                respond_status(&mut stream, 404);
                return;
            };
            let token = req.query.get("runfilter").map(|r| format!("_+{}", r));
            let files: Vec<_> = files
                .iter()
                .filter(|f| token.as_ref().map_or(true, |t| f.contains(t.as_str())))
                .map(|f| json!({ "fileId": f }))
                .collect();
            respond_json(&mut stream, json!({ "orderDetails": { "files": files } }));
        }
        ["orders", _order, "latest", file_id, "data"] => {
            let fault = {
                let mut faults = state.faults.lock().unwrap();
                match faults.get_mut(*file_id) {
                    Some(Fault::Always(status)) => Some(*status),
                    Some(Fault::FirstN { remaining, status }) if *remaining > 0 => {
                        *remaining -= 1;
                        Some(*status)
                    }
                    _ => None,
                }
            };
            match fault {
                Some(status) => respond_status(&mut stream, status),
                None => respond(
                    &mut stream,
                    200,
                    "OK",
                    "application/x-grib",
                    &MockApi::body_of(file_id),
                ),
            }
        }
        ["runs", model] => match state.runs.get(*model) {
            Some((run, at)) => respond_json(
                &mut stream,
                json!({
                    "modelId": model,
                    "completeRuns": [ { "run": run, "runDateTime": at } ]
                }),
            ),
            None => respond_status(&mut stream, 500),
        },
        _ => respond_status(&mut stream, 404),
    }
}
