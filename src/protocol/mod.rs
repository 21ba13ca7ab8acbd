//! WebSocket protocol core: opcodes, masking, frame codec and handshake.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD, MAX_PAYLOAD_LEN};
pub use handshake::{
    HandshakeKey, HandshakeRequest, WS_GUID, compute_accept_key, validate_response,
};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
