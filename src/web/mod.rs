//! HTTP API and live record stream.

pub mod error;
pub mod records;
pub mod routes;
pub mod status;
pub mod stream;

pub use routes::*;
