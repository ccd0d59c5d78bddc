//! The measurement client: owns a UDP socket, sends random-content discv5
//! packets, demultiplexes unsolicited WHOAREYOU replies by nonce, and
//! aggregates RTT/loss over repeated attempts per target.

mod client;

pub use client::{Client, MeasureError};

use std::time::Duration;

/// `run` issues exactly this many back-to-back attempts per target.
pub const ATTEMPTS: u32 = 100;
/// Per-attempt deadline, measured from the send call site.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(3);
/// Bounds concurrent in-flight sends, both direct `send` calls and the ones
/// inside `run`.
pub const CONCURRENCY_PERMITS: usize = 20;

/// `{ rtt, loss_rate }` over one `run`. A node with `loss_rate == 1.0` is
/// meant to be discarded by the caller (the node set never stores it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub rtt: Duration,
    pub loss_rate: f64,
}

impl ProbeResult {
    pub fn is_total_loss(&self) -> bool {
        self.loss_rate >= 1.0
    }
}
