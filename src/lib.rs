// Public API - the CLI drives the runner; library users embed the gateway
pub mod catalog;
pub mod codec;
pub mod error;
pub mod formats;
pub mod gateway;
pub mod runner;
pub mod schema;

// Internal modules
mod config;

#[cfg(test)]
mod integ_tests;
