use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::handle::{Discv5Handle, HandleError};
use crate::node::{NodeId, NodeRecord};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("crawler is already running")]
    AlreadyRunning,
    #[error("crawler has been stopped")]
    Stopped,
    #[error(transparent)]
    Handle(#[from] HandleError),
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub bootnodes: Vec<NodeRecord>,
    /// When false, discovered candidates are forwarded without an ENR
    /// liveness check — a pure-enumeration mode.
    pub check_liveness: bool,
}

/// Pulls an unbounded random walk off a `Discv5Handle`, filters by a
/// `seen` set, and forwards newly-confirmed-alive nodes one at a time.
/// The forward channel is approximately unbuffered (capacity 1): a slow
/// consumer blocks the crawl loop, providing backpressure by construction.
pub struct Crawler {
    disc: Arc<dyn Discv5Handle>,
    config: CrawlConfig,
    seen: Arc<Mutex<HashSet<NodeId>>>,
    rx: Mutex<Option<mpsc::Receiver<NodeRecord>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Crawler {
    pub fn new(disc: Arc<dyn Discv5Handle>, config: CrawlConfig) -> Self {
        Self {
            disc,
            config,
            seen: Arc::new(Mutex::new(HashSet::new())),
            rx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Spawns the crawl loop. Fails with `AlreadyRunning` if a previous
    /// `start()` hasn't been `stop()`ped.
    pub async fn start(&self) -> Result<(), CrawlError> {
        let mut task_slot = self.task.lock().await;
        if task_slot.is_some() {
            return Err(CrawlError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(1);
        *self.rx.lock().await = Some(rx);

        let disc = self.disc.clone();
        let seen = self.seen.clone();
        let check_liveness = self.config.check_liveness;

        let handle = tokio::spawn(async move {
            loop {
                let candidates: Vec<NodeRecord> = disc.random_nodes().collect();
                if candidates.is_empty() {
                    tracing::warn!("discv5 iterator exhausted, crawl loop stopping");
                    return;
                }

                for candidate in candidates {
                    let id = candidate.id();
                    if seen.lock().await.contains(&id) {
                        continue;
                    }

                    let resolved = if check_liveness {
                        match disc.request_enr(candidate.clone()).await {
                            Ok(record) => record,
                            Err(err) => {
                                tracing::debug!(error = %err, "candidate did not answer request_enr, skipping");
                                continue;
                            }
                        }
                    } else {
                        candidate
                    };

                    seen.lock().await.insert(id);
                    tracing::info!(node = %resolved.to_uri(), "discovered node");
                    if tx.send(resolved).await.is_err() {
                        // Receiver dropped: `stop()` was called.
                        return;
                    }
                }
            }
        });

        *task_slot = Some(handle);
        Ok(())
    }

    /// Signals shutdown and joins the crawl loop. Idempotent.
    pub async fn stop(&self) {
        self.disc.close().await;
        *self.rx.lock().await = None;
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Blocks until the next new, alive node is available.
    pub async fn next_node(&self) -> Result<NodeRecord, CrawlError> {
        let mut rx_slot = self.rx.lock().await;
        match rx_slot.as_mut() {
            Some(rx) => rx.recv().await.ok_or(CrawlError::Stopped),
            None => Err(CrawlError::Stopped),
        }
    }

    pub fn bootnodes(&self) -> &[NodeRecord] {
        &self.config.bootnodes
    }
}
