//! Shared utilities for petlog
//!
//! This crate provides:
//! - ID types (UserId, GroupId, LogId)
//! - Time utilities (injectable clock, mock time, duration formatting)
//! - Error types
//! - Default paths for the configuration file

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
