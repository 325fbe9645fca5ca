//! CLI command implementations.

pub mod common;
pub mod patch;
pub mod simulate;
pub mod validate;
