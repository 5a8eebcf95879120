pub mod batch;
pub mod dedup;
pub mod watermark;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchCollector, CollectedBatch};
pub use dedup::DedupGate;
pub use watermark::Watermarks;
