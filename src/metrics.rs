//! Thin facade over the `metrics` crate's recording macros. No exporter is
//! wired up here; whatever the binary installs as the global recorder (or
//! none at all, in which case these are no-ops) decides where the numbers
//! go.

use metrics::{counter, describe_counter};

/// Registers descriptions once; safe to call more than once, the recorder
/// de-dupes by name.
pub fn describe() {
    describe_counter!("discv5_probe_nodes_discovered", "nodes accepted into the node set");
    describe_counter!("discv5_probe_measurements_total", "completed measurement runs");
    describe_counter!("discv5_probe_timeouts_total", "individual probe attempts that timed out");
}

pub fn record_node_discovered() {
    counter!("discv5_probe_nodes_discovered").increment(1);
}

pub fn record_measurement() {
    counter!("discv5_probe_measurements_total").increment(1);
}

pub fn record_timeout() {
    counter!("discv5_probe_timeouts_total").increment(1);
}
