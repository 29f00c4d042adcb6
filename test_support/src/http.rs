//! Scripted HTTP stub server for tests.
//!
//! [`spawn_stub_server`] answers each incoming connection with the next
//! scripted [`StubResponse`] and records what it received. More replies can
//! be queued while the server runs. Once the script is exhausted every
//! request gets a 404. The listener is polled in non-blocking mode until the
//! handle is dropped, and reads are guarded by a timeout so a stalled client
//! cannot hang the suite.

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    /// Status code.
    pub status: u16,
    /// Body, sent with a JSON content type.
    pub body: String,
}

impl StubResponse {
    /// Reply with `status` and `body`.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `200 OK` with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

/// A request as seen by the stub.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Request method.
    pub method: String,
    /// Request target, including any query string.
    pub target: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: String,
}

impl RecordedRequest {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body parsed as JSON, or `Null` when it is empty or invalid.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Handle for a spawned stub. Stops and joins the server thread on drop.
#[derive(Debug)]
#[must_use]
pub struct StubServer {
    handle: Option<thread::JoinHandle<()>>,
    addr: SocketAddr,
    script: Arc<Mutex<VecDeque<StubResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    stop: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StubServer {
    /// Queue another reply after those already scripted.
    pub fn push(&self, reply: StubResponse) {
        lock(&self.script).push_back(reply);
    }

    /// Base URL of the stub, e.g. `http://127.0.0.1:4312`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Stop serving and propagate any panic from the server thread.
    pub fn join(mut self) -> thread::Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.take().expect("server already joined").join()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a stub answering connections with `script`, in order.
pub fn spawn_stub_server(script: Vec<StubResponse>) -> StubServer {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind HTTP listener");
    listener
        .set_nonblocking(true)
        .expect("set listener non-blocking");
    let addr = listener.local_addr().expect("local addr");
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let stop = Arc::new(AtomicBool::new(false));
    let handle = {
        let script = Arc::clone(&script);
        let requests = Arc::clone(&requests);
        let stop = Arc::clone(&stop);
        thread::spawn(move || serve(&listener, &script, &requests, &stop))
    };
    StubServer {
        handle: Some(handle),
        addr,
        script,
        requests,
        stop,
    }
}

fn serve(
    listener: &TcpListener,
    script: &Mutex<VecDeque<StubResponse>>,
    requests: &Mutex<Vec<RecordedRequest>>,
    stop: &AtomicBool,
) {
    while let Some(mut stream) = accept_connection(listener, stop) {
        let Some(request) = read_request(&mut stream) else {
            continue;
        };
        lock(requests).push(request);
        let reply = lock(script)
            .pop_front()
            .unwrap_or_else(|| StubResponse::new(404, r#"{"message": "no scripted response"}"#));
        write_response(&mut stream, &reply);
    }
}

fn accept_connection(listener: &TcpListener, stop: &AtomicBool) -> Option<TcpStream> {
    loop {
        if stop.load(Ordering::SeqCst) {
            return None;
        }
        match listener.accept() {
            Ok((stream, _)) => return Some(stream),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(_) => return None,
        }
    }
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|at| at + 4)
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(READ_TIMEOUT)).ok()?;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_len = loop {
        if let Some(end) = header_end(&buf) {
            break end;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(chunk.get(..n)?);
    };

    let head = String::from_utf8_lossy(buf.get(..head_len)?).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_owned();
    let target = request_line.next()?.to_owned();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
        .collect();
    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf.get(head_len..)?.to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(chunk.get(..n)?);
    }
    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn write_response(stream: &mut TcpStream, reply: &StubResponse) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reason(reply.status),
        reply.body.len(),
        reply.body
    );
    // The client may already have gone away; the test observes that instead.
    drop(stream.write_all(response.as_bytes()));
}
