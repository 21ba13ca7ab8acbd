//! Client side of the WebSocket opening handshake (RFC 6455 Section 4.1).
//!
//! The key and the request are written into fixed-capacity buffers; a write
//! that would overflow fails with `Error::CapacityExceeded` instead of growing.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::{BufMut, BytesMut};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::platform::RandomSource;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Length of a Base64-encoded 16-byte nonce.
pub const KEY_LEN: usize = 24;

/// Length of a Base64-encoded SHA-1 digest.
pub const ACCEPT_LEN: usize = 28;

const NONCE_LEN: usize = 16;
const ACCEPT_HEADER: &[u8] = b"Sec-WebSocket-Accept: ";
const SWITCHING_PROTOCOLS: &[u8] = b"HTTP/1.1 101";
const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wslink::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// A Sec-WebSocket-Key: 16 random bytes, Base64-encoded.
///
/// Generate a fresh one for every connection attempt; the server's accept
/// value is derived from it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HandshakeKey([u8; KEY_LEN]);

impl HandshakeKey {
    /// Generate a key from 16 bytes of `random`.
    ///
    /// # Errors
    ///
    /// Propagates failures of the random source.
    pub fn generate<G: RandomSource + ?Sized>(random: &mut G) -> Result<Self> {
        let mut nonce = [0u8; NONCE_LEN];
        random.fill(&mut nonce)?;
        Self::from_nonce(&nonce)
    }

    /// Encode a specific nonce.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapacityExceeded` if the encoding does not fit the key buffer.
    pub fn from_nonce(nonce: &[u8; NONCE_LEN]) -> Result<Self> {
        let mut encoded = [0u8; KEY_LEN];
        let written = BASE64
            .encode_slice(nonce, &mut encoded)
            .map_err(|_| Error::CapacityExceeded {
                needed: base64::encoded_len(NONCE_LEN, true).unwrap_or(usize::MAX),
                capacity: KEY_LEN,
            })?;
        if written != KEY_LEN {
            return Err(Error::InvalidHandshake(format!(
                "key encoded to {} bytes, expected {}",
                written, KEY_LEN
            )));
        }
        Ok(Self(encoded))
    }

    /// Parse an existing key, e.g. one taken from a captured request.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` unless `key` is 24 characters of
    /// Base64 decoding to exactly 16 bytes.
    pub fn parse(key: &str) -> Result<Self> {
        let decoded = BASE64
            .decode(key)
            .map_err(|_| Error::InvalidHandshake("Sec-WebSocket-Key is not valid Base64".into()))?;
        let nonce: [u8; NONCE_LEN] = decoded.as_slice().try_into().map_err(|_| {
            Error::InvalidHandshake(format!(
                "Sec-WebSocket-Key must be 16 bytes, got {}",
                decoded.len()
            ))
        })?;
        Self::from_nonce(&nonce)
    }

    /// The key as sent in the request header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// The Sec-WebSocket-Accept value a conforming server will answer with.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapacityExceeded` if the digest encoding does not fit.
    pub fn expected_accept(&self) -> Result<[u8; ACCEPT_LEN]> {
        let mut hasher = Sha1::new();
        hasher.update(self.0);
        hasher.update(WS_GUID.as_bytes());
        let digest = hasher.finalize();

        let mut accept = [0u8; ACCEPT_LEN];
        BASE64
            .encode_slice(digest.as_slice(), &mut accept)
            .map_err(|_| Error::CapacityExceeded {
                needed: base64::encoded_len(digest.len(), true).unwrap_or(usize::MAX),
                capacity: ACCEPT_LEN,
            })?;
        Ok(accept)
    }
}

impl std::fmt::Debug for HandshakeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HandshakeKey").field(&self.as_str()).finish()
    }
}

/// Append-only buffer that refuses to grow past its capacity.
struct BoundedBuf {
    buf: BytesMut,
    capacity: usize,
}

impl BoundedBuf {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.buf.len() + bytes.len();
        if needed > self.capacity {
            return Err(Error::CapacityExceeded {
                needed,
                capacity: self.capacity,
            });
        }
        self.buf.put_slice(bytes);
        Ok(())
    }

    fn into_inner(self) -> BytesMut {
        self.buf
    }
}

/// The HTTP Upgrade request opening a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRequest<'a> {
    /// Host name as given to `connect`.
    pub host: &'a str,
    /// Server port.
    pub port: u16,
    /// Request target, e.g. `/chat`.
    pub path: &'a str,
    /// Sec-WebSocket-Key for this attempt.
    pub key: &'a HandshakeKey,
}

impl HandshakeRequest<'_> {
    /// Serialize the request into a buffer of at most `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapacityExceeded` if the request does not fit.
    pub fn write(&self, capacity: usize) -> Result<BytesMut> {
        let port = self.port.to_string();
        let mut buf = BoundedBuf::with_capacity(capacity);

        buf.put(b"GET ")?;
        buf.put(self.path.as_bytes())?;
        buf.put(b" HTTP/1.1\r\n")?;
        buf.put(b"Upgrade: websocket\r\n")?;
        buf.put(b"Connection: Upgrade\r\n")?;
        buf.put(b"Host: ")?;
        buf.put(self.host.as_bytes())?;
        buf.put(b":")?;
        buf.put(port.as_bytes())?;
        buf.put(CRLF)?;
        buf.put(b"Sec-WebSocket-Key: ")?;
        buf.put(self.key.as_str().as_bytes())?;
        buf.put(CRLF)?;
        buf.put(b"Sec-WebSocket-Version: 13\r\n")?;
        buf.put(CRLF)?;

        Ok(buf.into_inner())
    }
}

/// Validate the server's handshake response against `key`.
///
/// The response must carry a `101` status line and a case-sensitive
/// `Sec-WebSocket-Accept: ` header whose value equals the expected accept
/// value exactly. Returns the length of the response head, including the
/// blank line, so any bytes after it can be treated as frames. Without a
/// blank line the whole buffer counts as head.
///
/// # Errors
///
/// Returns `Error::InvalidHandshake` if the status is not 101, the accept
/// header is missing or unterminated, or its value does not match.
pub fn validate_response(key: &HandshakeKey, response: &[u8]) -> Result<usize> {
    if !response.starts_with(SWITCHING_PROTOCOLS) {
        return Err(Error::InvalidHandshake(
            "Expected 101 Switching Protocols".into(),
        ));
    }

    let head_len = find(response, HEADER_END)
        .map(|pos| pos + HEADER_END.len())
        .unwrap_or(response.len());
    let head = &response[..head_len];

    let value_start = find(head, ACCEPT_HEADER)
        .map(|pos| pos + ACCEPT_HEADER.len())
        .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?;
    let value_len = find(&head[value_start..], CRLF).ok_or_else(|| {
        Error::InvalidHandshake("Unterminated Sec-WebSocket-Accept header".into())
    })?;
    let received = head[value_start..value_start + value_len].trim_ascii();

    let expected = key.expected_accept()?;
    if received != expected.as_slice() {
        return Err(Error::InvalidHandshake(format!(
            "Sec-WebSocket-Accept mismatch: got {:?}",
            String::from_utf8_lossy(received)
        )));
    }

    Ok(head_len)
}
