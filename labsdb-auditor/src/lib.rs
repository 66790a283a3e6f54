//! Library module for labsdb-auditor
//!
//! This module exposes the command implementations for testing purposes.
//! The binary entry point is in main.rs.

pub mod audit;
pub mod bootstrap;
pub mod cli;
pub mod output;

pub use audit::{load, run_audit, run_bootstrap};
pub use cli::{Cli, Command};
