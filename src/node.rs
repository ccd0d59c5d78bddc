use std::cmp::Ordering;
use std::net::{IpAddr, SocketAddr};

use discv5::enr::{CombinedKey, Enr};
use thiserror::Error;

pub type NodeId = [u8; 32];

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to parse ENR: {0}")]
    Parse(String),
}

/// An immutable discv5 identity: a signed ENR plus the fields the rest of
/// the crate actually reads out of it (id, seq, endpoint).
///
/// Equality is by node ID; ordering is by `seq` (larger = newer), matching
/// the rule the node set uses to decide whether a re-announced record
/// supersedes the one it already has.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    enr: Enr<CombinedKey>,
}

impl NodeRecord {
    pub fn parse(uri: &str) -> Result<Self, NodeError> {
        let enr: Enr<CombinedKey> = uri
            .trim()
            .parse()
            .map_err(|err: String| NodeError::Parse(err))?;
        Ok(Self { enr })
    }

    pub fn from_enr(enr: Enr<CombinedKey>) -> Self {
        Self { enr }
    }

    pub fn id(&self) -> NodeId {
        self.enr.node_id().raw()
    }

    pub fn seq(&self) -> u64 {
        self.enr.seq()
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.enr.ip4().map(IpAddr::V4)
    }

    pub fn udp_port(&self) -> Option<u16> {
        self.enr.udp4()
    }

    pub fn udp_addr(&self) -> Option<SocketAddr> {
        Some(SocketAddr::new(self.ip()?, self.udp_port()?))
    }

    pub fn enr(&self) -> &Enr<CombinedKey> {
        &self.enr
    }

    pub fn to_uri(&self) -> String {
        self.enr.to_base64()
    }
}

impl PartialEq for NodeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for NodeRecord {}

impl PartialOrd for NodeRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq().cmp(&other.seq())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal, known-valid discv5 ENR, reused from the reference test
    // vectors published with go-ethereum's p2p/enode package.
    const TEST_ENR: &str = "enr:-IS4QHCYrYZbAKWCBRlAy5zzaDZXJBGkcnh4MHcBFZntXNFrdvJjX04jRzjzCBOonrkTfj499SZuOh8R33Ls8RRcy5wBgmlkgnY0gmlwhH8AAAGJc2VjcDI1NmsxoQPKY0yuDUmstAHYpMa2_oxVtw0RW_QAdpzBQA8yWM0xOIN1ZHCCdl8";

    #[test]
    fn parses_enr_uri() {
        let node = NodeRecord::parse(TEST_ENR).expect("valid enr");
        assert_eq!(node.seq(), 1);
        assert_eq!(node.udp_port(), Some(30303));
    }

    #[test]
    fn equality_is_by_id_ordering_is_by_seq() {
        let a = NodeRecord::parse(TEST_ENR).unwrap();
        let b = NodeRecord::parse(TEST_ENR).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }
}
