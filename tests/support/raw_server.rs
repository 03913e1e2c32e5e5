//! Minimal HTTP/1.1 server that can cut a response body short.
//!
//! Wiremock always sends complete bodies, so broken streams are produced
//! here: the declared `Content-Length` is honest but the connection closes
//! after `keep` body bytes.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::socket_guard::sockets_available;

/// How one connection is answered.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawReply {
    /// Fixed status with the whole content as body. `None` serves the
    /// requested range (`206`), or `200` without a `Range` header.
    pub status: Option<u16>,
    /// Body bytes written before the connection is closed.
    pub keep: Option<usize>,
}

impl RawReply {
    /// Serves the range but closes after `keep` body bytes.
    pub fn truncated(keep: usize) -> Self {
        Self {
            status: None,
            keep: Some(keep),
        }
    }

    /// Answers with `status`, closing after `keep` body bytes.
    pub fn status(status: u16, keep: Option<usize>) -> Self {
        Self {
            status: Some(status),
            keep,
        }
    }
}

/// One connection per request, answered from a script; requests past the
/// end of the script get complete replies.
pub struct RawServer {
    addr: SocketAddr,
    ranges: Arc<Mutex<Vec<Option<String>>>>,
}

impl RawServer {
    /// Starts serving `content`, or returns `None` when sockets are unavailable.
    pub async fn start(content: Vec<u8>, script: Vec<RawReply>) -> Option<Self> {
        if !sockets_available() {
            return None;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&ranges);

        tokio::spawn(async move {
            let mut index = 0;
            while let Ok((socket, _)) = listener.accept().await {
                let reply = script.get(index).copied().unwrap_or_default();
                index += 1;
                serve(socket, &content, reply, &seen).await;
            }
        });

        Some(Self { addr, ranges })
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// `Range` header of every request, in order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.ranges.lock().unwrap().clone()
    }
}

async fn serve(
    mut socket: TcpStream,
    content: &[u8],
    reply: RawReply,
    seen: &Mutex<Vec<Option<String>>>,
) {
    let mut head = Vec::new();
    let mut buf = [0_u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&head).to_string();
    let range = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    });
    seen.lock().unwrap().push(range.clone());

    let total = content.len();
    let (status, body, content_range) = match (reply.status, range.as_deref()) {
        (Some(status), _) => (status, content, None),
        (None, Some(range)) => {
            let spec = range.trim_start_matches("bytes=");
            let (start, end) = spec.split_once('-').unwrap_or((spec, ""));
            let start: usize = start.parse().unwrap_or(0);
            if start >= total {
                let response = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{total}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                return;
            }
            let last = end.parse::<usize>().map_or(total - 1, |e| e.min(total - 1));
            (
                206,
                &content[start..=last],
                Some(format!("bytes {start}-{last}/{total}")),
            )
        }
        (None, None) => (200, content, None),
    };

    let mut response = format!(
        "HTTP/1.1 {status} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    if let Some(content_range) = content_range {
        response.push_str(&format!("Content-Range: {content_range}\r\n"));
    }
    response.push_str("\r\n");

    let keep = reply.keep.unwrap_or(body.len()).min(body.len());
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.write_all(&body[..keep]).await;
    let _ = socket.flush().await;
    let _ = socket.shutdown().await;
}
