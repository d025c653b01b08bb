//! fitscore — AI-driven job/candidate compatibility scoring (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod env;
pub mod models;
pub mod output;
pub mod prompt;
pub mod providers;
pub mod validate;
