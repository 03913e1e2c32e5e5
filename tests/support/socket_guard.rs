//! Skips socket-based tests where the sandbox forbids binding localhost.

use std::net::TcpListener;

use wiremock::MockServer;

/// True when a loopback TCP listener can be opened.
pub fn sockets_available() -> bool {
    match TcpListener::bind("127.0.0.1:0") {
        Ok(_) => true,
        Err(e) => {
            eprintln!("skipping test: cannot bind a local socket ({e})");
            false
        }
    }
}

/// Starts a wiremock server, or returns `None` when sockets are unavailable.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if !sockets_available() {
        return None;
    }
    Some(MockServer::start().await)
}
