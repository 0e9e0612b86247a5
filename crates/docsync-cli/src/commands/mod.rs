//! Command handlers

pub mod config;
pub mod pull;
pub mod push;
pub mod watch;
