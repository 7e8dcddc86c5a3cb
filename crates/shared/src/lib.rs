//! Chatline Shared Types
//!
//! Identity types, presence status and errors shared between the Chatline crates.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
