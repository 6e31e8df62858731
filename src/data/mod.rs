//! Record models and persistence.

pub mod batch;
pub mod models;
pub mod postgres;
pub mod store;
