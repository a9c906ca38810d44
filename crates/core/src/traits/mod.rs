//! Core traits for Codebox.

pub mod skills;

pub use skills::*;
