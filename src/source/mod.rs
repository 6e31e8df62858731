//! The upstream missing-person listing: fetching, paging, and record extraction.

pub mod client;
pub mod dates;
pub mod errors;
pub mod extract;
pub mod pagination;
pub mod patterns;

pub use client::{PAGE_PARAM, PageSource, Safe182Client};
pub use errors::{ExtractError, SourceError};
pub use extract::RecordExtractor;
pub use pagination::{Harvest, Paginator};
pub use patterns::{CompiledPatterns, FieldPatterns};
