//! DHT-backed discovery: an injectable `Discv5Handle` capability trait and
//! the `Crawler` that turns its random walk into a deduplicated stream of
//! confirmed-alive nodes.

mod crawler;
mod handle;

pub use crawler::{CrawlConfig, CrawlError, Crawler};
pub use handle::{Discv5Handle, HandleError, RealDiscv5Handle};

#[cfg(any(test, feature = "test-utils"))]
pub use handle::fake::FakeDiscv5Handle;
