//! The discv5 wire codec: static-header layout, IV-masked AES-128-CTR
//! header obfuscation, and the WHOAREYOU auth-data framing. Pure and
//! stateless — this module owns no sockets and no session state.

mod auth;
mod codec;
mod header;

pub use auth::{decode_whoareyou_auth, gen_random_packet, MessageAuthData, WhoareyouAuthData};
pub use codec::{decode_raw, encode_raw, WireError};
pub use header::{Flag, Header, StaticHeader};

/// discv5 packets are capped at this size on the wire.
pub const MAX_PACKET_SIZE: usize = 1280;
pub const IV_SIZE: usize = 16;
pub const NONCE_SIZE: usize = 12;
pub const STATIC_HEADER_SIZE: usize = 6 + 2 + 1 + NONCE_SIZE + 2;
pub const WHOAREYOU_AUTH_SIZE: usize = 24;
pub const MESSAGE_AUTH_SIZE: usize = 32;
pub const RANDOM_MESSAGE_SIZE: usize = 20;

pub const PROTOCOL_ID: [u8; 6] = *b"discv5";
pub const VERSION: u16 = 1;
pub const MIN_VERSION: u16 = 1;
