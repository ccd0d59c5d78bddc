//! Whole-file JSON persistence of the node set. Intentionally not
//! atomic — a crash mid-write can corrupt the file; that's accepted rather
//! than guarded against here.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::measure::ProbeResult;
use crate::node::NodeRecord;
use crate::nodeset::NodeSet;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("snapshot entry has an invalid ENR: {0}")]
    InvalidEnr(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotResult {
    #[serde(rename = "Rtt")]
    rtt_nanos: u128,
    #[serde(rename = "LossRate")]
    loss_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    #[serde(rename = "NodeUrl")]
    node_url: String,
    #[serde(rename = "Result")]
    result: SnapshotResult,
    #[serde(rename = "RefreshedAt")]
    refreshed_at: DateTime<Utc>,
    #[serde(rename = "UpdatedAt")]
    updated_at: DateTime<Utc>,
}

/// Serializes front-to-back, matching the documented array order.
pub fn save(set: &NodeSet, path: &Path) -> Result<(), SnapshotError> {
    let entries: Vec<SnapshotEntry> = set
        .iter_front_to_back()
        .map(|node| SnapshotEntry {
            node_url: node.record.to_uri(),
            result: SnapshotResult {
                rtt_nanos: node.result.rtt.as_nanos(),
                loss_rate: node.result.loss_rate,
            },
            refreshed_at: node.refreshed_at,
            updated_at: node.updated_at,
        })
        .collect();

    let json = serde_json::to_vec_pretty(&entries)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Loads entries in file order, inserting each at the front (so the last
/// entry read ends up at the back) with `expiry = now`, so the liveness
/// loop re-probes everything immediately after a reload.
pub fn load(path: &Path) -> Result<NodeSet, SnapshotError> {
    let mut set = NodeSet::new();
    if !path.exists() {
        return Ok(set);
    }

    let bytes = std::fs::read(path)?;
    let entries: Vec<SnapshotEntry> = serde_json::from_slice(&bytes)?;

    for entry in entries {
        let record = NodeRecord::parse(&entry.node_url)
            .map_err(|err| SnapshotError::InvalidEnr(err.to_string()))?;
        let result = ProbeResult {
            rtt: std::time::Duration::from_nanos(entry.result.rtt_nanos.min(u64::MAX as u128) as u64),
            loss_rate: entry.result.loss_rate,
        };
        set.load_entry(record, result, entry.refreshed_at, entry.updated_at);
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn node_with_port(port: u16) -> NodeRecord {
        let key = discv5::enr::CombinedKey::generate_secp256k1();
        let enr = discv5::enr::Enr::builder()
            .ip4(Ipv4Addr::LOCALHOST)
            .udp4(port)
            .build(&key)
            .unwrap();
        NodeRecord::from_enr(enr)
    }

    #[test]
    fn round_trips_five_entries() {
        let mut set = NodeSet::new();
        for i in 0..5u16 {
            let record = node_with_port(30300 + i);
            let result = ProbeResult {
                rtt: Duration::from_millis(10 + i as u64),
                loss_rate: f64::from(i) / 10.0,
            };
            set.add(record, result);
        }
        assert_eq!(set.len(), 5);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        save(&set, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 5);

        for node in set.iter_front_to_back() {
            let loaded_node = loaded.get(&node.record.id()).expect("entry survives round trip");
            assert_eq!(loaded_node.result.rtt, node.result.rtt);
            assert_eq!(loaded_node.result.loss_rate, node.result.loss_rate);
            assert!(loaded_node.expiry <= std::time::Instant::now());
        }
    }

    #[test]
    fn load_of_missing_file_returns_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let set = load(&path).unwrap();
        assert!(set.is_empty());
    }
}
