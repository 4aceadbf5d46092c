//! Incremental search watcher: fetch new matches since the last checkpoint,
//! store and notify each one, and advance the checkpoint only when the whole
//! batch went through.

pub mod aggregator;
pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod model;
pub mod notify;
pub mod processor;
pub mod search;
pub mod store;
pub mod worker;

pub use error::RunError;
pub use worker::{RunOutcome, RunResult, Worker};
