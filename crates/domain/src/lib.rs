//! Shared vocabulary for sessionrelay: configuration, errors, session status,
//! and structured trace events.

pub mod config;
pub mod error;
pub mod status;
pub mod trace;
