//! Minimal HTTP/1.1 server that mimics the queue API for integration tests.
//!
//! Serves `mylist`, `requestdl` and the control endpoints for the three
//! resource classes from fixed data, and records every request.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path plus query string, as sent.
    pub target: String,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct ApiServerOptions {
    /// `requestdl` for these item ids answers 404 ITEM_NOT_FOUND.
    pub missing_items: Vec<u64>,
    /// `mylist` for this class answers 502 with an HTML body.
    pub broken_class: Option<&'static str>,
}

pub struct ApiServer {
    pub base: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl ApiServer {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose path contains `fragment`.
    pub fn requests_to(&self, fragment: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.target.split('?').next().unwrap_or("").contains(fragment))
            .collect()
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start() -> ApiServer {
    start_with_options(ApiServerOptions::default())
}

pub fn start_with_options(opts: ApiServerOptions) -> ApiServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let log = Arc::clone(&log);
            let opts = Arc::clone(&opts);
            thread::spawn(move || handle(stream, &log, &opts));
        }
    });
    ApiServer {
        base: format!("http://127.0.0.1:{}/v1/api", port),
        requests,
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let mut authorization = None;
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(value.trim().to_string());
            } else if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(Recorded {
        method,
        target,
        authorization,
        body,
    })
}

fn handle(mut stream: TcpStream, log: &Mutex<Vec<Recorded>>, opts: &ApiServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let (status, content_type, body) = route(&req, opts);
    log.lock().unwrap().push(req);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn query_value<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then_some(v)
    })
}

fn route(req: &Recorded, opts: &ApiServerOptions) -> (&'static str, &'static str, String) {
    let (path, query) = req.target.split_once('?').unwrap_or((&req.target, ""));
    let mut segments = path.trim_start_matches("/v1/api/").split('/');
    let class = segments.next().unwrap_or("");
    let endpoint = segments.next().unwrap_or("");

    match (req.method.as_str(), endpoint) {
        ("GET", "mylist") => {
            if opts.broken_class == Some(class) {
                return (
                    "502 Bad Gateway",
                    "text/html",
                    "<html>bad gateway</html>".to_string(),
                );
            }
            ("200 OK", "application/json", list_body(class))
        }
        ("GET", "requestdl") => {
            let id_param = match class {
                "torrents" => "torrent_id",
                "usenet" => "usenet_id",
                _ => "web_id",
            };
            let id: u64 = query_value(query, id_param)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            if opts.missing_items.contains(&id) {
                return (
                    "404 Not Found",
                    "application/json",
                    r#"{"success":false,"error":"ITEM_NOT_FOUND","detail":"Item not found."}"#
                        .to_string(),
                );
            }
            let file = query_value(query, "file_id").unwrap_or("zip");
            let url = format!("https://cdn.test/{class}/{id}/{file}?token=dl");
            // Torrents answer in `data`, the other classes in `download_url`.
            let body = if class == "torrents" {
                format!(r#"{{"success":true,"data":"{url}"}}"#)
            } else {
                format!(r#"{{"success":true,"download_url":"{url}"}}"#)
            };
            ("200 OK", "application/json", body)
        }
        ("POST", e) if e.starts_with("control") => (
            "200 OK",
            "application/json",
            r#"{"success":true,"detail":"ok"}"#.to_string(),
        ),
        _ => (
            "404 Not Found",
            "application/json",
            r#"{"success":false,"error":"ENDPOINT_NOT_FOUND"}"#.to_string(),
        ),
    }
}

fn list_body(class: &str) -> String {
    let items = match class {
        "torrents" => r#"[
            {"id": 1, "name": "ubuntu.iso", "active": true, "size": 100, "auth_id": 42,
             "download_state": "downloading", "progress": 0.5,
             "files": [{"id": 0, "name": "ubuntu.iso", "size": 100}]},
            {"id": 2, "name": "debian.iso", "active": false, "size": 200, "auth_id": 42,
             "download_state": "queued", "files": []}
        ]"#,
        "usenet" => r#"[
            {"id": 10, "name": "show.s01", "active": false, "size": 300, "auth_id": "42",
             "files": [{"id": 1, "name": "e01.mkv", "size": 150}, {"id": 2, "name": "e02.mkv", "size": 150}]}
        ]"#,
        _ => r#"[
            {"id": 20, "name": "paper.pdf", "active": false, "size": 5, "auth_id": 42, "original_url": "https://example.org/paper.pdf"}
        ]"#,
    };
    format!(r#"{{"success":true,"data":{items}}}"#)
}
