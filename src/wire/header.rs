use super::{NONCE_SIZE, WHOAREYOU_AUTH_SIZE};
use crate::wire::WireError;

/// Packet header flag values (static_header.flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flag {
    Message = 0,
    Whoareyou = 1,
    Handshake = 2,
}

impl Flag {
    pub(crate) fn from_u8(value: u8) -> Result<Self, WireError> {
        match value {
            0 => Ok(Flag::Message),
            1 => Ok(Flag::Whoareyou),
            2 => Ok(Flag::Handshake),
            _ => Err(WireError::InvalidFlag),
        }
    }
}

/// The 23-byte static header, bit-exact and big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHeader {
    pub flag: Flag,
    pub nonce: [u8; NONCE_SIZE],
    pub auth_size: u16,
}

/// A fully decoded (or about-to-be-encoded) discv5 packet header, plus the
/// masking IV that isn't part of the static header itself but travels
/// alongside it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub iv: [u8; 16],
    pub static_header: StaticHeader,
    pub auth_data: Vec<u8>,
}

impl Header {
    pub fn flag(&self) -> Flag {
        self.static_header.flag
    }

    pub fn nonce(&self) -> [u8; NONCE_SIZE] {
        self.static_header.nonce
    }

    /// `true` iff this is a well-formed WHOAREYOU header: the right flag and
    /// exactly 24 bytes of auth-data (`decode_whoareyou_auth`'s own
    /// precondition is checked separately by callers that also care about
    /// the reason).
    pub fn is_whoareyou(&self) -> bool {
        self.static_header.flag == Flag::Whoareyou && self.auth_data.len() == WHOAREYOU_AUTH_SIZE
    }
}
