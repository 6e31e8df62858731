pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod fanout;
pub mod geocode;
pub mod ingest;
pub mod logging;
pub mod source;
pub mod state;
pub mod utils;
pub mod web;
