//! Core types for the policy engine
//!
//! - `PolicyError` - Error type for loading and validating policy

pub mod error;

pub use error::{PolicyError, PolicyResult};
