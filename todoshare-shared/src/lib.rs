//! # ToDo Share Core
//!
//! Access control and sharing for multi-user ToDo lists: who may see a ToDo,
//! who may change it, and how grants are managed.
//!
//! ## Module Organization
//!
//! - `models`: Users, ToDos, Tasks and grants, with their queries
//! - `auth`: Access resolution (`owner`, `write`, `read`, none)
//! - `sharing`: Granting and revoking access
//! - `mutation`: Write operations on ToDos and Tasks
//! - `listing`: Read-side views filtered by access
//! - `db`: Connection pool and migrations
//! - `config`: Configuration management
//! - `error`: Common error types

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod listing;
pub mod models;
pub mod mutation;
pub mod sharing;

/// Current version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
