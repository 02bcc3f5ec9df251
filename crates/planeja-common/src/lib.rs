//! Planeja+ Common - Shared types and utilities
//!
//! This crate provides common types, configuration, and utilities
//! shared across all Planeja+ components.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
