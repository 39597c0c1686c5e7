//! Library exports for finpal, shared between the binary and tests.

pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod persistence;
pub mod providers;
pub mod routes;
pub mod startup;
pub mod state;
pub mod utils;
