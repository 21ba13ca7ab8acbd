//! Recording collaborators for the engine.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use wslink::{
    Client, Config, Control, Error, Handler, OpCode, RandomSource, Resolution, Resolver, Result,
    Status, Timer, Transport, compute_accept_key,
};

/// Key produced when [`FixedRandom`] yields the RFC 6455 sample nonce.
pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
pub const SAMPLE_NONCE: &[u8; 16] = b"the sample nonce";

#[derive(Debug, Default)]
pub struct MockTransport {
    pub connects: Vec<SocketAddr>,
    pub sent: Vec<Bytes>,
    pub disconnects: usize,
    pub refuse_connect: bool,
    pub refuse_send: bool,
}

impl MockTransport {
    /// The handshake request, as text.
    pub fn request(&self) -> String {
        String::from_utf8_lossy(&self.sent[0]).into_owned()
    }

    /// Frames sent after the handshake request.
    pub fn frames(&self) -> &[Bytes] {
        self.sent.get(1..).unwrap_or(&[])
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, remote: SocketAddr) -> Result<()> {
        if self.refuse_connect {
            return Err(Error::Transport("refused".into()));
        }
        self.connects.push(remote);
        Ok(())
    }

    fn send(&mut self, data: Bytes) -> Result<()> {
        if self.refuse_send {
            return Err(Error::Transport("send buffer full".into()));
        }
        self.sent.push(data);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
    Ready(IpAddr),
    Pending,
    Reject,
}

#[derive(Debug)]
pub struct MockResolver {
    pub mode: ResolverMode,
    pub lookups: Vec<String>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self {
            mode: ResolverMode::Ready(IpAddr::from([10, 0, 0, 7])),
            lookups: Vec::new(),
        }
    }
}

impl Resolver for MockResolver {
    fn resolve(&mut self, host: &str) -> Result<Resolution> {
        self.lookups.push(host.to_owned());
        match self.mode {
            ResolverMode::Ready(ip) => Ok(Resolution::Ready(ip)),
            ResolverMode::Pending => Ok(Resolution::Pending),
            ResolverMode::Reject => Err(Error::InvalidTarget(host.to_owned())),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockTimer {
    pub arms: Vec<Duration>,
    pub cancels: usize,
    pub armed: bool,
    pub generation: u64,
}

impl Timer for MockTimer {
    fn arm(&mut self, after: Duration, generation: u64) {
        self.arms.push(after);
        self.armed = true;
        self.generation = generation;
    }

    fn cancel(&mut self) {
        self.cancels += 1;
        self.armed = false;
    }
}

/// Deterministic randomness: the sample nonce first, then a fixed mask.
#[derive(Debug)]
pub struct FixedRandom {
    bytes: VecDeque<u8>,
    mask: [u8; 4],
}

impl FixedRandom {
    pub fn new(mask: [u8; 4]) -> Self {
        Self {
            bytes: SAMPLE_NONCE.iter().copied().collect(),
            mask,
        }
    }

    /// Queue another nonce for a reconnect.
    pub fn push_nonce(&mut self, nonce: &[u8; 16]) {
        self.bytes.extend(nonce.iter().copied());
    }
}

impl RandomSource for FixedRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.bytes.pop_front().unwrap_or(self.mask[i % 4]);
        }
        Ok(())
    }
}

/// Handler recording every callback. Optionally replies from callbacks.
#[derive(Debug, Default)]
pub struct Recorder {
    pub statuses: Vec<Status>,
    pub data: Vec<(OpCode, Vec<u8>)>,
    pub greeting: Option<String>,
    pub echo: bool,
    pub disconnect_on_data: bool,
}

impl Recorder {
    pub fn count(&self, status: Status) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }
}

impl Handler for Recorder {
    fn on_status(&mut self, status: Status, control: &mut Control) {
        self.statuses.push(status);
        if status == Status::Connected {
            if let Some(greeting) = &self.greeting {
                control.send_text(greeting.clone());
            }
        }
    }

    fn on_data(&mut self, opcode: OpCode, payload: &[u8], control: &mut Control) {
        self.data.push((opcode, payload.to_vec()));
        if self.echo {
            control.send(opcode, payload);
        }
        if self.disconnect_on_data {
            control.disconnect();
        }
    }
}

pub type TestClient = Client<MockTransport, MockResolver, MockTimer, Recorder, FixedRandom>;

pub const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

pub fn test_client(config: Config) -> TestClient {
    Client::with_random(
        MockTransport::default(),
        MockResolver::default(),
        MockTimer::default(),
        Recorder::default(),
        FixedRandom::new(MASK),
        config,
    )
}

/// A well-formed `101` response for `key`.
pub fn accept_response(key: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        compute_accept_key(key)
    )
    .into_bytes()
}

/// Unmasked server frame with a 7-bit or 16-bit length.
pub fn server_frame(opcode: OpCode, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x80 | opcode.as_u8()];
    if payload.len() <= 125 {
        out.push(payload.len() as u8);
    } else {
        out.push(126);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}
