//! rxstream Core Library
//!
//! This crate provides the error taxonomy, stream states and configuration
//! shared across all rxstream components.

pub mod config;
pub mod error;
pub mod types;

pub use config::StreamConfig;
pub use error::{Error, Result, ResultExt};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::config::StreamConfig;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::types::*;
}
