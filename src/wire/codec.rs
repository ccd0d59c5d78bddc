use aes::cipher::{KeyIvInit, StreamCipher};
use thiserror::Error;

use super::header::{Flag, Header, StaticHeader};
use super::{IV_SIZE, MIN_VERSION, PROTOCOL_ID, STATIC_HEADER_SIZE};
use crate::node::NodeId;

type Aes128Ctr = ctr::Ctr64BE<aes::Aes128>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("packet shorter than the minimum header size")]
    TooShort,
    #[error("invalid protocol id")]
    InvalidHeader,
    #[error("protocol version below the minimum supported version")]
    MinVersion,
    #[error("auth_size exceeds the remaining packet bytes")]
    AuthSize,
    #[error("unexpected or unknown packet flag")]
    InvalidFlag,
}

/// `iv || encrypted(static_header || auth_data) || msg_data`, masked with
/// AES-128-CTR keyed by the first 16 bytes of the destination's node ID.
/// `msg_data` is left untouched: the real peer on the other end decrypts
/// it, we never do: no session, no message decoding.
pub fn encode_raw(dest_id: &NodeId, header: &Header, msg_data: &[u8]) -> Vec<u8> {
    let mut buf =
        Vec::with_capacity(IV_SIZE + STATIC_HEADER_SIZE + header.auth_data.len() + msg_data.len());
    buf.extend_from_slice(&header.iv);
    buf.extend_from_slice(&PROTOCOL_ID);
    buf.extend_from_slice(&super::VERSION.to_be_bytes());
    buf.push(header.static_header.flag as u8);
    buf.extend_from_slice(&header.static_header.nonce);
    buf.extend_from_slice(&header.static_header.auth_size.to_be_bytes());
    buf.extend_from_slice(&header.auth_data);

    let key = &dest_id[..16];
    let mut cipher = Aes128Ctr::new(key.into(), (&header.iv).into());
    cipher.apply_keystream(&mut buf[IV_SIZE..]);

    buf.extend_from_slice(msg_data);
    buf
}

/// Reverses [`encode_raw`]. The auth-data is decrypted by *continuing* the
/// same CTR keystream that decrypted the static header, rather than
/// starting a fresh cipher instance over the two regions separately — this
/// is required for bit-compatibility with real discv5 peers even though it
/// isn't obvious from reading the two regions' definitions in isolation.
pub fn decode_raw(packet: &[u8], self_id: &NodeId) -> Result<(Header, Vec<u8>), WireError> {
    if packet.len() < IV_SIZE + STATIC_HEADER_SIZE {
        return Err(WireError::TooShort);
    }

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&packet[..IV_SIZE]);

    let key = &self_id[..16];
    let mut cipher = Aes128Ctr::new(key.into(), (&iv).into());

    let mut header_buf = packet[IV_SIZE..IV_SIZE + STATIC_HEADER_SIZE].to_vec();
    cipher.apply_keystream(&mut header_buf);

    if header_buf[0..6] != PROTOCOL_ID {
        return Err(WireError::InvalidHeader);
    }
    let version = u16::from_be_bytes([header_buf[6], header_buf[7]]);
    if version < MIN_VERSION {
        return Err(WireError::MinVersion);
    }
    let flag = Flag::from_u8(header_buf[8])?;
    let mut nonce = [0u8; super::NONCE_SIZE];
    nonce.copy_from_slice(&header_buf[9..21]);
    let auth_size = u16::from_be_bytes([header_buf[21], header_buf[22]]) as usize;

    let after_header = &packet[IV_SIZE + STATIC_HEADER_SIZE..];
    if auth_size > after_header.len() {
        return Err(WireError::AuthSize);
    }

    let mut auth_data = after_header[..auth_size].to_vec();
    cipher.apply_keystream(&mut auth_data);
    let msg_data = after_header[auth_size..].to_vec();

    let header = Header {
        iv,
        static_header: StaticHeader {
            flag,
            nonce,
            auth_size: auth_size as u16,
        },
        auth_data,
    };
    Ok((header, msg_data))
}
