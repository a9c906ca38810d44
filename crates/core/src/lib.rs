//! Core types, traits, and error definitions for Codebox.
//!
//! This crate holds everything both sides of the sandbox boundary agree on:
//! the invocation and result data model, the literal codec used for the
//! environment payload, the result wire format, and the shared error type.

pub mod config;
pub mod error;
pub mod literal;
pub mod protocol;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
