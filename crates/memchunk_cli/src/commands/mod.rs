//! CLI command implementations.

pub mod flags;
pub mod key;
pub mod simulate;
