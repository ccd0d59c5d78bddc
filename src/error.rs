use thiserror::Error;

/// Crate-level error, used by the binaries to pick an exit path.
///
/// Individual components keep their own narrower error enum; this only
/// aggregates them so `main` can match on one type.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Wire(#[from] crate::wire::WireError),
    #[error(transparent)]
    Measure(#[from] crate::measure::MeasureError),
    #[error(transparent)]
    Crawl(#[from] crate::crawl::CrawlError),
    #[error(transparent)]
    Driver(#[from] crate::driver::DriverError),
    #[error(transparent)]
    Node(#[from] crate::node::NodeError),
    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
