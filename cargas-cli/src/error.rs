//! Error taxonomy for load processing
//!
//! Cell-level validation failures are never errors; they travel as
//! observation strings attached to rows. These variants cover everything
//! that aborts a load outright.

use thiserror::Error;

/// Terminal failure while processing a load
#[derive(Debug, Error)]
pub enum LoadError {
    /// Template, rule or file configuration problem; surfaced before any
    /// row is processed
    #[error("{0}")]
    Config(String),
    /// Uploader lacks access to the template
    #[error("{0}")]
    Unauthorized(String),
    /// Bulk insert into the physical table failed
    #[error("{0}")]
    Storage(String),
    /// Report artifact could not be written
    #[error("{0}")]
    Report(String),
}

impl LoadError {
    pub fn config(message: impl Into<String>) -> Self {
        LoadError::Config(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        LoadError::Unauthorized(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LoadError::Storage(message.into())
    }

    pub fn report(message: impl Into<String>) -> Self {
        LoadError::Report(message.into())
    }
}
