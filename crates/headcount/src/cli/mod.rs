//! Command handlers.

pub mod config;
pub mod estimate;
pub mod serve;
