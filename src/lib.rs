//! Watches Maven, npm and pip projects for outdated dependencies and
//! proposes upgrades as pull requests.
pub mod adapter;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod forge;
pub mod git;
pub mod process;
pub mod scheduler;
pub mod store;
pub mod version;
pub mod watcher;

pub use error::{Result, WatchError};

#[cfg(test)]
pub mod test_helpers;
