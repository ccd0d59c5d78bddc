use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use rand::RngCore;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;

use super::{ProbeResult, ATTEMPTS, CONCURRENCY_PERMITS, SEND_TIMEOUT};
use crate::node::{NodeId, NodeRecord};
use crate::wire::{self, Header, MAX_PACKET_SIZE};

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("probe timed out")]
    Timeout,
    #[error("target ENR has no UDP endpoint")]
    NoEndpoint,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

type NonceMap = Mutex<HashMap<[u8; 12], oneshot::Sender<Header>>>;

/// Concurrent UDP request/response engine. One client owns one ephemeral
/// socket and one local identity for the lifetime of the process.
pub struct Client {
    local_id: NodeId,
    socket: Arc<UdpSocket>,
    calls: Arc<NonceMap>,
    permits: Arc<Semaphore>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Binds a UDP socket on `listen_addr`, picks a fresh random local
    /// identity, and spawns the read loop. Key generation is treated as an
    /// opaque random source here: we never establish a real discv5
    /// session, so there's no need for a real signed ENR, only 32
    /// sufficiently random bytes the peer will mask its WHOAREYOU reply
    /// with.
    pub async fn listen(listen_addr: SocketAddr) -> Result<Self, MeasureError> {
        let socket = UdpSocket::bind(listen_addr).await?;
        let mut local_id = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut local_id);

        let socket = Arc::new(socket);
        let calls: Arc<NonceMap> = Arc::new(Mutex::new(HashMap::new()));

        let read_task = tokio::spawn(Self::read_loop(socket.clone(), local_id, calls.clone()));

        Ok(Self {
            local_id,
            socket,
            calls,
            permits: Arc::new(Semaphore::new(CONCURRENCY_PERMITS)),
            read_task: Mutex::new(Some(read_task)),
        })
    }

    async fn read_loop(socket: Arc<UdpSocket>, local_id: NodeId, calls: Arc<NonceMap>) {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let (len, _from) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(err) => {
                    tracing::debug!(error = %err, "measurement socket closed, read loop exiting");
                    return;
                }
            };

            match wire::decode_raw(&buf[..len], &local_id) {
                Ok((header, msg_data)) => {
                    if !header.is_whoareyou() || !msg_data.is_empty() {
                        tracing::debug!("dropping reply that isn't a bare WHOAREYOU");
                        continue;
                    }
                    if let Some(reply_tx) = calls.lock().await.remove(&header.nonce()) {
                        // oneshot::Sender::send never blocks; a dropped
                        // receiver (the call already timed out) just makes
                        // this a no-op instead of leaking the reader task.
                        let _ = reply_tx.send(header);
                    }
                }
                Err(err) => {
                    tracing::debug!(error = ?err, "dropped malformed datagram");
                }
            }
        }
    }

    /// One probe round-trip. Registers the call before sending so a reply
    /// racing the write can never be missed.
    pub async fn send(&self, target: &NodeRecord) -> Result<Header, MeasureError> {
        let addr = target.udp_addr().ok_or(MeasureError::NoEndpoint)?;
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        let (header, msg_data) = wire::gen_random_packet(self.local_id, target.id());
        let packet = wire::encode_raw(&target.id(), &header, &msg_data);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.calls.lock().await.insert(header.nonce(), reply_tx);

        if let Err(err) = self.socket.send_to(&packet, addr).await {
            self.calls.lock().await.remove(&header.nonce());
            return Err(MeasureError::Io(err));
        }

        match tokio::time::timeout(SEND_TIMEOUT, reply_rx).await {
            Ok(Ok(reply_header)) => Ok(reply_header),
            Ok(Err(_closed)) => {
                self.calls.lock().await.remove(&header.nonce());
                Err(MeasureError::Timeout)
            }
            Err(_elapsed) => {
                self.calls.lock().await.remove(&header.nonce());
                Err(MeasureError::Timeout)
            }
        }
    }

    /// 100 sequential attempts; the RTT divisor is the total attempt count,
    /// not the successful-attempt count, which makes the mean pessimistic
    /// under loss by design.
    pub async fn run(&self, target: &NodeRecord) -> Result<ProbeResult, MeasureError> {
        let mut timeouts: u32 = 0;
        let mut total = std::time::Duration::ZERO;

        for _ in 0..ATTEMPTS {
            let started = Instant::now();
            match self.send(target).await {
                Ok(_header) => total += started.elapsed(),
                Err(MeasureError::Timeout) => {
                    timeouts += 1;
                    crate::metrics::record_timeout();
                }
                Err(other) => return Err(other),
            }
        }

        crate::metrics::record_measurement();
        Ok(ProbeResult {
            rtt: total / ATTEMPTS,
            loss_rate: f64::from(timeouts) / f64::from(ATTEMPTS),
        })
    }

    /// Idempotent: aborts and joins the read loop exactly once, no matter
    /// how many times it's called.
    pub async fn close(&self) {
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Number of calls still awaiting a reply or timeout. Exposed for
    /// tests that assert the nonce map drains completely after a probe.
    pub async fn pending_calls(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("local_id", &hex::encode(self.local_id))
            .finish_non_exhaustive()
    }
}

