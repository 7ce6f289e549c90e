//! Client-side synchronization core for the course catalogue admin console.
//!
//! Keeps normalized in-memory lists of courses, modules, lessons, topics,
//! questions and tags in sync with the catalogue REST API.

pub mod api;
pub mod config;
pub mod console;
pub mod diff;
pub mod errors;
pub mod models;
pub mod store;
pub mod sync;

pub use config::Config;
pub use console::Console;
pub use errors::ApiError;

#[cfg(test)]
mod tests;
