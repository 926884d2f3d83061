//! Shared helpers used across commands

pub mod colors;
pub mod dates;
pub mod formatting;
pub mod progress;
