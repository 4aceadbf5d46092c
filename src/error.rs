//! Error taxonomy reported through a run's completion contract.
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("cursor read failed: {0}")]
    CursorRead(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("storage failed: {0}")]
    Storage(String),
    #[error("notification dispatch failed: {0}")]
    Notify(String),
    #[error("cursor write failed: {0}")]
    CursorWrite(String),
    #[error("{0}")]
    Validation(&'static str),
    #[error("batch did not settle within {0:?}")]
    Timeout(Duration),
    #[error("run did not complete successfully")]
    Incomplete,
}

impl RunError {
    pub fn fetch(err: &anyhow::Error) -> Self {
        RunError::Fetch(format!("{err:#}"))
    }

    pub fn storage(err: &anyhow::Error) -> Self {
        RunError::Storage(format!("{err:#}"))
    }

    pub fn notify(err: &anyhow::Error) -> Self {
        RunError::Notify(format!("{err:#}"))
    }

    pub fn cursor_read(err: &anyhow::Error) -> Self {
        RunError::CursorRead(format!("{err:#}"))
    }

    pub fn cursor_write(err: &anyhow::Error) -> Self {
        RunError::CursorWrite(format!("{err:#}"))
    }
}
