use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::node::{NodeError, NodeRecord};

/// Ephemeral bind address used when the operator doesn't override it.
pub const DEFAULT_LISTEN_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

/// Mirrors go-ethereum's `params.V5Bootnodes`: a small list of long-lived
/// Ethereum Foundation discv5 bootstrap nodes, used when the operator
/// doesn't pass `--bootnodes`.
pub const DEFAULT_BOOTNODES: &[&str] = &[
    "enr:-Ku4QHqVeJ8PPICcWk1vSn_XcSkjOkNiTg6Fmii5j6vUQgvzMc9L1goFnLKgXqBJspJjIsB91LTOleFmyWWrFVATGngBh2F0dG5ldHOIAAAAAAAAAACEZXRoMpA0P4xqAAAAAP__________gmlkgnY0gmlwhAMRHkWJc2VjcDI1NmsxoQKLVXFOhp2uX6jeT0DvvDpPcU8FWMjQdR4wMuORMhpX24N1ZHCCIyg",
    "enr:-Ku4QG-2_Md3sZIAUebGYT6g0SMskIml77l6yR-M_JXc-UdNHCmHQeOiMLbylPejyJsdAPsTHJyjJB2sYGDLe0dn8uYBh2F0dG5ldHOIAAAAAAAAAACEZXRoMpA0P4xqAAAAAP__________gmlkgnY0gmlwhBLf22SJc2VjcDI1NmsxoQORcM6e19T1T9gi7jxEZjk_sjVLGFscUNqAY9obgZaxbIN1ZHCCIyg",
];

/// Runtime configuration shared by both binaries.
#[derive(Debug, Clone)]
pub struct Config {
    pub bootnodes: Vec<NodeRecord>,
    /// When false, the crawler forwards every candidate without an
    /// ENR-liveness check (used by the crawler-only tool).
    pub check_liveness: bool,
    pub snapshot_path: Option<PathBuf>,
    /// Local address the measurement client's UDP socket binds to.
    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootnodes: Self::default_bootnodes(),
            check_liveness: true,
            snapshot_path: None,
            listen_addr: DEFAULT_LISTEN_ADDR,
        }
    }
}

impl Config {
    pub fn parse_bootnodes(csv: &str) -> Result<Vec<NodeRecord>, NodeError> {
        csv.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(NodeRecord::parse)
            .collect()
    }

    /// Falls back to the built-in list; entries that fail to parse are
    /// skipped with a warning rather than treated as fatal, since this list
    /// ships with the binary and a single stale entry shouldn't block
    /// startup.
    pub fn default_bootnodes() -> Vec<NodeRecord> {
        DEFAULT_BOOTNODES
            .iter()
            .filter_map(|uri| match NodeRecord::parse(uri) {
                Ok(node) => Some(node),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping invalid built-in bootnode");
                    None
                }
            })
            .collect()
    }
}
