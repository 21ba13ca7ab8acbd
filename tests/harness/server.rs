//! Single-connection WebSocket echo server.
//!
//! Accepts one client, answers the upgrade, then echoes Text and Binary
//! frames unmasked. A Close frame is echoed and the socket shut down.
//! [`TestServer::spawn_mute`] answers the upgrade and then stops reading.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use wslink::compute_accept_key;
use wslink::protocol::apply_mask;

pub struct TestServer {
    task: JoinHandle<Vec<Vec<u8>>>,
}

impl TestServer {
    /// Bind to a random local port and serve one connection.
    ///
    /// When `greet` is set the server sends a Ping with that payload right
    /// after the upgrade.
    pub async fn spawn(greet: Option<&'static [u8]>) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve(stream, greet).await
        });

        (Self { task }, addr)
    }

    /// Bind to a random local port, answer one upgrade, then hold the socket
    /// open for `hold` without ever reading from it.
    pub async fn spawn_mute(hold: Duration) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            upgrade(&mut stream, &mut buf).await;
            tokio::time::sleep(hold).await;
            Vec::new()
        });

        (Self { task }, addr)
    }

    /// Stop serving without waiting.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the connection to end and return the payloads received.
    pub async fn finish(self) -> Vec<Vec<u8>> {
        self.task.await.unwrap()
    }
}

/// Read the upgrade request into `buf` and answer it. Bytes past the request
/// head stay in `buf`.
async fn upgrade(stream: &mut TcpStream, buf: &mut Vec<u8>) {
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before upgrade");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let key = head
        .lines()
        .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
        .unwrap()
        .trim()
        .to_owned();
    buf.drain(..head_end);

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        compute_accept_key(&key)
    );
    stream.write_all(response.as_bytes()).await.unwrap();
}

async fn serve(mut stream: TcpStream, greet: Option<&'static [u8]>) -> Vec<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    upgrade(&mut stream, &mut buf).await;

    if let Some(ping) = greet {
        stream.write_all(&frame(0x9, ping)).await.unwrap();
    }

    let mut received = Vec::new();
    loop {
        while let Some((opcode, payload, used)) = parse_masked(&buf) {
            buf.drain(..used);
            match opcode {
                0x1 | 0x2 => {
                    stream.write_all(&frame(opcode, &payload)).await.unwrap();
                    received.push(payload);
                }
                0x8 => {
                    let _ = stream.write_all(&frame(0x8, &payload)).await;
                    let _ = stream.shutdown().await;
                    return received;
                }
                _ => received.push(payload),
            }
        }

        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return received,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x80 | opcode];
    if payload.len() <= 125 {
        out.push(payload.len() as u8);
    } else {
        out.push(126);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

fn parse_masked(buf: &[u8]) -> Option<(u8, Vec<u8>, usize)> {
    if buf.len() < 2 {
        return None;
    }
    let opcode = buf[0] & 0x0F;
    let (len, mut pos) = match buf[1] & 0x7F {
        126 if buf.len() >= 4 => (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4),
        126 => return None,
        len => (len as usize, 2),
    };
    if buf.len() < pos + 4 + len {
        return None;
    }
    let mask = [buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]];
    pos += 4;
    let mut payload = buf[pos..pos + len].to_vec();
    apply_mask(&mut payload, mask);
    Some((opcode, payload, pos + len))
}
