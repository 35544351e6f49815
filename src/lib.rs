//! ODDSWATCH: odds comparison monitor
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod parse;
pub mod bookmakers;
pub mod engine;
pub mod session;
pub mod notify;
