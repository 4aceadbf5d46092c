//! Database module: row models and SQL repositories.
//!
//! - `model`: rows returned by repositories.
//! - `repo`: SQL-only functions over the SQLite pool.
//!
//! The storage traits the worker consumes are implemented on top of these in
//! `crate::store`.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::RecordRow;
