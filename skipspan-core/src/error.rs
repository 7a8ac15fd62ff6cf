//! Error types for skipspan
//!
//! This module defines the error types used throughout skipspan.

use thiserror::Error;

/// The main error type for skipspan operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An interval was constructed with its lower bound above its upper bound
    #[error("Invalid interval: lower bound exceeds upper bound")]
    InvalidInterval,
}

/// A specialized Result type for skipspan operations
pub type Result<T> = std::result::Result<T, Error>;
