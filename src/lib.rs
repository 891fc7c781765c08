//! Game core of an OGame-like universe
//!
//! State only moves forward when it is read: every access to a planet or a
//! player first consolidates the actions that completed since the last
//! access, under a lock drawn from a bounded pool.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod consolidator;
pub mod content;
pub mod costs;
pub mod db;
pub mod error;
pub mod locker;
pub mod models;
mod procedures;
pub mod proxies;
pub mod tech_tree;
pub mod validator;

pub use error::{GameError, Result};
pub use proxies::Proxies;
