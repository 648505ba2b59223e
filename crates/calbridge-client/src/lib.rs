//! calbridge command-line interface.
//!
//! This crate provides the `calbridge` binary: Google sign-in, calendar and
//! event listing, and event creation, replacement and deletion.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
