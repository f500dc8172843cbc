//! Shared primitives for the agent runners.
//!
//! Storage, the frontier and context reads, the task lifecycle, and the
//! oracle boundary all live here. Nothing in `core` knows about a specific
//! agent role.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod frontier;
pub mod gateway;
pub mod interpret;
pub mod oracle;
pub mod prompts;
pub mod recall;
pub mod records;
pub mod schemas;
pub mod store;
pub mod tasks;
pub mod time;
