//! Keel CLI library.
//!
//! Inspect stored record versions, classify and check fields, apply edits
//! through an editing session, and manage local drafts.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use config::Config;
pub use context::Context;
pub use error::{CliError, Result};
pub use output::Formatter;
