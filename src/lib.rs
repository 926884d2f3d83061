//! checkclaw CLI library
//!
//! This module exports the CLI functionality for testing and potential library use.

#![forbid(unsafe_code)]

pub mod api;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod credentials;
pub mod errors;
pub mod link;
pub mod models;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export for easy access
pub use commands::OutputFormat;
pub use config::*;
pub use errors::*;
