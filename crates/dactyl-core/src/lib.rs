//! Core types for the dactyl virtual biometric device stack.
//!
//! This crate holds everything the other layers agree on: the error
//! kinds of the device contract, the finger/status/capability domain
//! types, and the [`Print`] biometric template value with its
//! serialized format and content-equality semantics.

pub mod constants;
pub mod error;
pub mod print;
pub mod types;

pub use error::{Error, Result};
pub use print::{Print, PrintBuilder};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
