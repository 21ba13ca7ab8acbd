//! WebSocket frame encoding and decoding (RFC 6455 subset).
//!
//! Only single-frame messages with payloads up to 65535 bytes are handled.
//! Decoding is zero-copy: the returned [`Frame`] borrows the receive buffer
//! and any masking is undone in place.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Largest payload expressible without the 64-bit length form.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Longest header this codec writes: 2 fixed bytes, 16-bit length, mask key.
pub const MAX_HEADER_LEN: usize = 2 + 2 + 4;

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const OPCODE_BITS: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_BITS: u8 = 0x7F;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

#[derive(Debug, Clone)]
struct FrameHeader {
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    header_len: usize,
}

/// Parse a frame header from the front of `buf`.
///
/// # Errors
///
/// - `Error::IncompleteFrame` if the header is cut short
/// - `Error::FragmentedFrame` if FIN is clear or the opcode is continuation
/// - `Error::ReservedBitsSet` if any RSV bit is set
/// - `Error::UnsupportedLength` for the 64-bit length form
fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(Error::IncompleteFrame {
            needed: 2 - buf.len(),
        });
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    let opcode = OpCode::from_u8(byte0 & OPCODE_BITS)?;
    if byte0 & FIN_BIT == 0 {
        return Err(Error::FragmentedFrame);
    }
    if byte0 & RSV_BITS != 0 {
        return Err(Error::ReservedBitsSet);
    }

    let masked = byte1 & MASK_BIT != 0;
    let (payload_len, len_size) = match byte1 & LEN_BITS {
        LEN_64 => return Err(Error::UnsupportedLength),
        LEN_16 => {
            if buf.len() < 4 {
                return Err(Error::IncompleteFrame {
                    needed: 4 - buf.len(),
                });
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 2)
        }
        len => (len as usize, 0),
    };

    if opcode.is_control() && payload_len > MAX_CONTROL_FRAME_PAYLOAD {
        return Err(Error::ControlFrameTooLarge(payload_len));
    }

    let mask_offset = 2 + len_size;
    let header_len = if masked { mask_offset + 4 } else { mask_offset };
    if buf.len() < header_len {
        return Err(Error::IncompleteFrame {
            needed: header_len - buf.len(),
        });
    }

    let mask = masked.then(|| {
        [
            buf[mask_offset],
            buf[mask_offset + 1],
            buf[mask_offset + 2],
            buf[mask_offset + 3],
        ]
    });

    Ok(FrameHeader {
        opcode,
        mask,
        payload_len,
        header_len,
    })
}

/// A single, final WebSocket frame.
///
/// For decoded frames the payload borrows the receive buffer and is valid
/// only until that buffer is reused; copy it out to keep it longer.
///
/// ## Frame Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |       (16, if len == 126)     |
/// |N|V|V|V|       |S|             |                               |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                 Masking key (client frames only)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Frame opcode.
    pub opcode: OpCode,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Create a frame over `payload`.
    #[must_use]
    pub const fn new(opcode: OpCode, payload: &'a [u8]) -> Self {
        Self { opcode, payload }
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub const fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Masked payloads are unmasked in place. Returns the frame and the
    /// number of bytes it occupied. A buffer that ends mid-frame is an
    /// error; nothing is kept for a later call.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` is shorter than the frame
    /// - `Error::UnsupportedLength` for 64-bit lengths
    /// - `Error::FragmentedFrame`, `Error::ReservedBitsSet`,
    ///   `Error::ReservedOpcode` for frames this client cannot interpret
    /// - `Error::ControlFrameTooLarge` for control payloads over 125 bytes
    pub fn decode(buf: &'a mut [u8]) -> Result<(Self, usize)> {
        let header = parse_header(buf)?;

        let total_size = header.header_len + header.payload_len;
        if buf.len() < total_size {
            return Err(Error::IncompleteFrame {
                needed: total_size - buf.len(),
            });
        }

        let payload = &mut buf[header.header_len..total_size];
        if let Some(mask) = header.mask {
            apply_mask_fast(payload, mask);
        }

        let frame = Frame {
            opcode: header.opcode,
            payload,
        };
        Ok((frame, total_size))
    }

    /// Total wire size of the frame at the front of `buf`, read from its
    /// header. Returns `Ok(None)` while the header itself is cut short.
    ///
    /// # Errors
    ///
    /// Header errors as for [`decode`](Self::decode).
    pub fn wire_len(buf: &[u8]) -> Result<Option<usize>> {
        match parse_header(buf) {
            Ok(header) => Ok(Some(header.header_len + header.payload_len)),
            Err(Error::IncompleteFrame { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Number of bytes [`encode`](Self::encode) appends.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let extended = if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
            2
        } else {
            0
        };
        2 + extended + 4 + self.payload.len()
    }

    /// Append the masked wire form of this frame to `dst`.
    ///
    /// FIN and MASK are always set.
    ///
    /// # Errors
    ///
    /// - `Error::FrameTooLarge` if the payload exceeds 65535 bytes
    /// - `Error::ControlFrameTooLarge` for control payloads over 125 bytes
    pub fn encode(&self, mask: [u8; 4], dst: &mut BytesMut) -> Result<()> {
        let payload_len = self.payload.len();
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(Error::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_LEN,
            });
        }
        if self.opcode.is_control() && payload_len > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload_len));
        }

        dst.reserve(self.encoded_len());
        dst.put_u8(FIN_BIT | self.opcode.as_u8());

        if payload_len <= MAX_CONTROL_FRAME_PAYLOAD {
            dst.put_u8(MASK_BIT | payload_len as u8);
        } else {
            dst.put_u8(MASK_BIT | LEN_16);
            dst.put_u16(payload_len as u16);
        }

        dst.put_slice(&mask);

        let start = dst.len();
        dst.put_slice(self.payload);
        apply_mask_fast(&mut dst[start..], mask);

        Ok(())
    }
}
