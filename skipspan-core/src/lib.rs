//! Core types for skipspan
//!
//! This crate contains the value types and error handling shared by the
//! skipspan index back-ends. It provides:
//!
//! - Common error types with [`Error`] and [`Result`]
//! - The [`Interval`] value type with independently open or closed endpoints
//!
//! # Example
//!
//! ```
//! use skipspan_core::Interval;
//!
//! let window = Interval::new(0.0, 10.0, true, false)?;
//! assert!(window.contains(&0.0));
//! assert!(!window.contains(&10.0));
//! # Ok::<(), skipspan_core::Error>(())
//! ```

pub mod error;
pub mod interval;

pub use error::{Error, Result};
pub use interval::Interval;
