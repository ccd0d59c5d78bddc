//! Composes the crawler, measurement client and node set into the three
//! cooperating background loops described by the driver component:
//! intake, liveness refresh, and autosave.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::crawl::Crawler;
use crate::measure::Client;
use crate::nodeset::NodeSet;
use crate::snapshot;

const INTAKE_PERMITS: usize = 20;
const REFRESH_PERMITS: usize = 40;
const REFRESH_ATTEMPTS: u32 = 5;
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Crawl(#[from] crate::crawl::CrawlError),
    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),
}

/// Owns the three background loops and the shared node set they all touch.
/// `shutdown()` cancels every loop and joins their handles; it's the
/// natural completion of "exit non-zero on unrecoverable failure" without
/// leaking tasks.
pub struct Driver {
    crawler: Arc<Crawler>,
    client: Arc<Client>,
    node_set: Arc<Mutex<NodeSet>>,
    snapshot_path: Option<PathBuf>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Driver {
    pub fn new(crawler: Arc<Crawler>, client: Arc<Client>, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            crawler,
            client,
            node_set: Arc::new(Mutex::new(NodeSet::new())),
            snapshot_path,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Seeds the node set from an existing snapshot file, if configured and
    /// present. Call before `run()`.
    pub async fn load_snapshot(&self) -> Result<(), DriverError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let loaded = snapshot::load(path)?;
        let loaded_len = loaded.len();
        *self.node_set.lock().await = loaded;
        tracing::info!(entries = loaded_len, "loaded snapshot");
        Ok(())
    }

    /// Starts the crawler plus the three background loops and returns
    /// immediately; call `shutdown()` to stop them.
    pub async fn run(&self) -> Result<(), DriverError> {
        self.crawler.start().await?;

        let intake = tokio::spawn(Self::intake_loop(
            self.crawler.clone(),
            self.client.clone(),
            self.node_set.clone(),
            self.cancel.clone(),
        ));
        let liveness = tokio::spawn(Self::liveness_loop(
            self.client.clone(),
            self.node_set.clone(),
            self.cancel.clone(),
        ));
        let autosave = tokio::spawn(Self::autosave_loop(
            self.node_set.clone(),
            self.snapshot_path.clone(),
            self.cancel.clone(),
        ));

        *self.tasks.lock().await = vec![intake, liveness, autosave];
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.crawler.stop().await;
        for handle in self.tasks.lock().await.drain(..) {
            let _ = handle.await;
        }
    }

    pub fn node_set(&self) -> Arc<Mutex<NodeSet>> {
        self.node_set.clone()
    }

    async fn intake_loop(
        crawler: Arc<Crawler>,
        client: Arc<Client>,
        node_set: Arc<Mutex<NodeSet>>,
        cancel: CancellationToken,
    ) {
        let permits = Arc::new(Semaphore::new(INTAKE_PERMITS));
        loop {
            let candidate = tokio::select! {
                _ = cancel.cancelled() => return,
                next = crawler.next_node() => match next {
                    Ok(node) => node,
                    Err(err) => {
                        tracing::warn!(error = %err, "crawler stopped, intake loop exiting");
                        return;
                    }
                },
            };

            if !node_set.lock().await.dry_add(&candidate) {
                continue;
            }

            let permit = match permits.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            let client = client.clone();
            let node_set = node_set.clone();
            tokio::spawn(async move {
                let _permit = permit;
                match client.run(&candidate).await {
                    Ok(result) if !result.is_total_loss() => {
                        tracing::info!(node = %candidate.to_uri(), rtt = ?result.rtt, loss = result.loss_rate, "measured node");
                        node_set.lock().await.add(candidate, result);
                    }
                    Ok(result) => {
                        tracing::debug!(node = %candidate.to_uri(), "discarding total-loss node");
                        let _ = result;
                    }
                    Err(err) => {
                        tracing::debug!(node = %candidate.to_uri(), error = %err, "measurement failed");
                    }
                }
            });
        }
    }

    /// Scans from the back forward, collecting expired entries, re-probing
    /// each with up to 5 single-send attempts, and re-arming the timer for
    /// the new back entry's expiry. Woken early whenever `add`/`refresh`/
    /// `remove` changes the earliest deadline, rather than sleeping against
    /// a deadline computed once and never revisited — an empty set (the
    /// common case right after startup, before the first measurement
    /// lands) waits on that notification alone instead of an astronomical
    /// timer duration.
    async fn liveness_loop(client: Arc<Client>, node_set: Arc<Mutex<NodeSet>>, cancel: CancellationToken) {
        let permits = Arc::new(Semaphore::new(REFRESH_PERMITS));
        let changed = node_set.lock().await.change_notifier();
        loop {
            let next_expiry = node_set.lock().await.next_expiry();

            match next_expiry {
                Some(expiry) => {
                    let sleep_for = expiry.saturating_duration_since(std::time::Instant::now());
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = changed.notified() => continue,
                        _ = tokio::time::sleep(sleep_for) => {}
                    }
                }
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = changed.notified() => continue,
                    }
                }
            }

            let expired = node_set.lock().await.collect_expired();
            let mut refreshes = Vec::with_capacity(expired.len());
            for entry in expired {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                let client = client.clone();
                let node_set = node_set.clone();
                let seq_at_launch = entry.record.seq();
                let id = entry.record.id();
                refreshes.push(tokio::spawn(async move {
                    let _permit = permit;
                    let alive = Self::reprobe(&client, &entry).await;

                    let mut set = node_set.lock().await;
                    let still_current = set.get(&id).map(|n| n.record.seq() == seq_at_launch).unwrap_or(false);
                    if !still_current {
                        return;
                    }
                    if alive {
                        set.refresh(&id);
                    } else {
                        set.remove(&id);
                        tracing::info!(node = %entry.record.to_uri(), "evicted unreachable node");
                    }
                }));
            }
            for handle in refreshes {
                let _ = handle.await;
            }
        }
    }

    async fn reprobe(client: &Client, entry: &crate::nodeset::MeasuredNode) -> bool {
        for _ in 0..REFRESH_ATTEMPTS {
            if client.send(&entry.record).await.is_ok() {
                return true;
            }
        }
        false
    }

    async fn autosave_loop(
        node_set: Arc<Mutex<NodeSet>>,
        snapshot_path: Option<PathBuf>,
        cancel: CancellationToken,
    ) {
        let Some(path) = snapshot_path else {
            return;
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(AUTOSAVE_INTERVAL) => {}
            }

            let set = node_set.lock().await;
            if let Err(err) = snapshot::save(&set, &path) {
                tracing::error!(error = %err, "autosave failed, aborting driver");
                return;
            }
        }
    }

}
