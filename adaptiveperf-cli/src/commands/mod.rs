//! CLI command implementations.

pub mod classify;
pub mod schedule;
pub mod simulate;
