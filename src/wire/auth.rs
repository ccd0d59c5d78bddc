use rand::RngCore;

use super::header::{Flag, Header, StaticHeader};
use super::{MESSAGE_AUTH_SIZE, RANDOM_MESSAGE_SIZE, WHOAREYOU_AUTH_SIZE};
use crate::node::NodeId;
use crate::wire::WireError;

/// `id_nonce[16] || record_seq:u64`, big-endian, exactly 24 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhoareyouAuthData {
    pub id_nonce: [u8; 16],
    pub record_seq: u64,
}

impl WhoareyouAuthData {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WHOAREYOU_AUTH_SIZE);
        buf.extend_from_slice(&self.id_nonce);
        buf.extend_from_slice(&self.record_seq.to_be_bytes());
        buf
    }
}

/// Parses the auth-data of a WHOAREYOU header.
pub fn decode_whoareyou_auth(header: &Header) -> Result<WhoareyouAuthData, WireError> {
    if header.static_header.flag != Flag::Whoareyou {
        return Err(WireError::InvalidFlag);
    }
    if header.auth_data.len() != WHOAREYOU_AUTH_SIZE {
        return Err(WireError::AuthSize);
    }
    let mut id_nonce = [0u8; 16];
    id_nonce.copy_from_slice(&header.auth_data[..16]);
    let record_seq = u64::from_be_bytes(header.auth_data[16..24].try_into().expect("checked len"));
    Ok(WhoareyouAuthData {
        id_nonce,
        record_seq,
    })
}

/// The auth-data of a MESSAGE packet we originate: just our own node ID, so
/// the recipient has something to issue a WHOAREYOU against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageAuthData {
    pub src_id: NodeId,
}

/// Builds a MESSAGE-flagged packet carrying nothing but random bytes. A
/// discv5 peer that doesn't recognize the source replies with a WHOAREYOU
/// whose header nonce echoes this packet's nonce — that's the free
/// liveness/RTT probe this whole tool is built on.
///
/// `to_id` isn't used here (it's consumed by `encode_raw`'s masking key
/// instead); it's kept as a parameter to mirror the call site's intent —
/// "a random packet destined for this peer" — at the cost of an unused
/// binding.
pub fn gen_random_packet(from_id: NodeId, _to_id: NodeId) -> (Header, Vec<u8>) {
    let mut rng = rand::thread_rng();

    let mut nonce = [0u8; super::NONCE_SIZE];
    rng.fill_bytes(&mut nonce);
    let mut iv = [0u8; 16];
    rng.fill_bytes(&mut iv);
    let mut msg_data = vec![0u8; RANDOM_MESSAGE_SIZE];
    rng.fill_bytes(&mut msg_data);

    let header = Header {
        iv,
        static_header: StaticHeader {
            flag: Flag::Message,
            nonce,
            auth_size: MESSAGE_AUTH_SIZE as u16,
        },
        auth_data: from_id.to_vec(),
    };
    (header, msg_data)
}
