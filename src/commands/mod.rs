//! CLI command implementations
//!
//! Every command except `list-transports` runs against an open chain handle.
//! `display` holds the single-operation commands, `demo` the animated ones.

pub mod demo;
pub mod display;
mod list;

pub use list::list_transports;

/// Result type shared by the commands
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;
