//! `/health` route (mounted outside the auth/rate/body gates on every
//! service) and the `--healthcheck` CLI helper (spec §6): invoking any
//! binary with `--healthcheck` opens a TCP connection to
//! `127.0.0.1:<port>/health` and exits 0 iff the response contains `200`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use axum::response::IntoResponse;
use axum::Json;

pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Returns `true` iff a plain HTTP GET against `127.0.0.1:<port>/health`
/// comes back with a response line containing `200`. Intended to be
/// called from `main` before the async runtime is spun up, matching how
/// the teacher's binary handles its `--healthcheck` style CLI flags.
pub fn run_healthcheck(port: u16) -> bool {
    let addr = format!("127.0.0.1:{port}");
    let mut stream = match TcpStream::connect(&addr) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    if stream.write_all(request.as_bytes()).is_err() {
        return false;
    }
    let mut buf = Vec::new();
    if stream.read_to_end(&mut buf).is_err() {
        return false;
    }
    String::from_utf8_lossy(&buf).contains("200")
}

/// Checks `argv` for a bare `--healthcheck` flag and, if present, runs the
/// check and calls `std::process::exit` with the resulting code. Should be
/// called at the very top of `main` before building the tokio runtime.
pub fn maybe_healthcheck_and_exit(port: u16) {
    if std::env::args().any(|a| a == "--healthcheck") {
        std::process::exit(if run_healthcheck(port) { 0 } else { 1 });
    }
}
