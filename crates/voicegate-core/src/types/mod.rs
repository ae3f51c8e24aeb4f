//! Shared type definitions.

mod tool;

pub use tool::*;
