//! shellcache - offline cache layer for a single-origin web application
//!
//! Keeps a versioned snapshot of the app's must-have assets, serves
//! documents and assets from it when the network is gone, and evicts older
//! snapshots once a new version is explicitly activated.

pub mod classify;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod http;
pub mod journal;
pub mod layer;
pub mod lifecycle;
pub mod manifest;
pub mod network;
pub mod store;
pub mod strategy;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use error::{ShellcacheError, ShellcacheResult};
pub use layer::{Interception, LayerSettings, ShellCache};
