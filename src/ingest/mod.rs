//! Scheduled ingestion of the upstream listing into the record store.

pub mod fallback;
pub mod poller;
pub mod recency;
pub mod scheduler;

pub use fallback::{FallbackDataSource, SampleFallback};
pub use poller::{IngestError, Poller, RecentCache, RunContext, RunOutcome, RunSummary};
pub use recency::RecencyFilter;
pub use scheduler::Scheduler;
