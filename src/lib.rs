//! task-forest Library
//!
//! This module exports the core components for testing and integration.

pub mod ai;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod server;
pub mod snapshot;
pub mod types;
