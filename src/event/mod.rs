pub mod archive;
pub mod filter;
pub mod record;

pub use archive::{save_envelope, ArchiveError};
pub use filter::EventNameFilter;
pub use record::{ActorIdentity, EventEnvelope, EventRecord, TlsDetails};
