//! # leadflow-core
//!
//! Core types, traits, configuration, and error handling for the Leadflow bot.

pub mod bus;
pub mod config;
pub mod contact;
pub mod error;
pub mod flow;
pub mod inbound;
pub mod traits;

/// Expand a leading `~` to the user's home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}
