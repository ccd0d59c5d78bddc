use async_trait::async_trait;
use thiserror::Error;

use crate::node::NodeRecord;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("discv5 DHT error: {0}")]
    Dht(String),
}

/// The only surface the crawler needs from a discv5 DHT implementation.
/// Kept narrow and injectable so production code can wrap the real
/// `discv5` crate while tests inject a scripted fake.
#[async_trait]
pub trait Discv5Handle: Send + Sync {
    /// An unbounded random-walk iterator over the routing table. Matches
    /// the underlying `discv5`/`enode` crates' own iterator shape: pulling
    /// it is allowed to block while the DHT performs lookups.
    fn random_nodes(&self) -> Box<dyn Iterator<Item = NodeRecord> + Send>;

    /// Re-requests a candidate's ENR directly, returning whatever record
    /// the peer currently advertises (which may have a higher `seq` than
    /// the one passed in).
    async fn request_enr(&self, node: NodeRecord) -> Result<NodeRecord, HandleError>;

    async fn close(&self);
}

/// Production binding: wraps a live `discv5::Discv5` instance. The real
/// DHT implementation is used strictly as an external collaborator here —
/// no session, handshake or message internals are touched.
pub struct RealDiscv5Handle {
    inner: discv5::Discv5,
}

impl RealDiscv5Handle {
    pub fn new(inner: discv5::Discv5) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Discv5Handle for RealDiscv5Handle {
    /// `discv5::Discv5` doesn't expose a streaming random-walk iterator
    /// directly; the closest analogue is a routing-table snapshot, which we
    /// hand out as one randomly-ordered batch of candidates per call. The
    /// crawl loop keeps calling this repeatedly, so the DHT's own
    /// background queries still keep feeding fresh entries into later
    /// snapshots over time.
    fn random_nodes(&self) -> Box<dyn Iterator<Item = NodeRecord> + Send> {
        let entries: Vec<NodeRecord> = self
            .inner
            .table_entries_enr()
            .into_iter()
            .map(NodeRecord::from_enr)
            .collect();
        Box::new(entries.into_iter())
    }

    async fn request_enr(&self, node: NodeRecord) -> Result<NodeRecord, HandleError> {
        // `Discv5::request_enr` only exists behind the `libp2p` feature and
        // takes a multiaddr; `find_node_designated_peer` with distance 0
        // sends the same FINDNODE-for-self request directly against an ENR.
        let mut enrs = self
            .inner
            .find_node_designated_peer(node.enr().clone(), vec![0])
            .await
            .map_err(|err| HandleError::Dht(err.to_string()))?;
        enrs.pop()
            .map(NodeRecord::from_enr)
            .ok_or_else(|| HandleError::Dht("peer returned no ENR".to_string()))
    }

    async fn close(&self) {
        // discv5::Discv5 has no async shutdown of its own beyond dropping
        // the service; nothing further to await here.
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod fake {
    use super::*;
    use tokio::sync::Mutex;

    /// Replays a fixed script: a list of candidate ENRs to hand out from
    /// `random_nodes`, and a map from node ID to the `request_enr` outcome
    /// for that candidate.
    pub struct FakeDiscv5Handle {
        candidates: Vec<NodeRecord>,
        answers: Mutex<std::collections::HashMap<[u8; 32], Result<NodeRecord, String>>>,
    }

    impl FakeDiscv5Handle {
        pub fn new(
            candidates: Vec<NodeRecord>,
            answers: std::collections::HashMap<[u8; 32], Result<NodeRecord, String>>,
        ) -> Self {
            Self {
                candidates,
                answers: Mutex::new(answers),
            }
        }
    }

    #[async_trait]
    impl Discv5Handle for FakeDiscv5Handle {
        fn random_nodes(&self) -> Box<dyn Iterator<Item = NodeRecord> + Send> {
            Box::new(self.candidates.clone().into_iter())
        }

        async fn request_enr(&self, node: NodeRecord) -> Result<NodeRecord, HandleError> {
            let answers = self.answers.lock().await;
            match answers.get(&node.id()) {
                Some(Ok(record)) => Ok(record.clone()),
                Some(Err(msg)) => Err(HandleError::Dht(msg.clone())),
                None => Err(HandleError::Dht("no scripted answer for this node".into())),
            }
        }

        async fn close(&self) {}
    }
}
