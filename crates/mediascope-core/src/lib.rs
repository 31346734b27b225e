//! Mediascope core crate - shared types, vector codec, errors and configuration.

pub mod codec;
pub mod config;
pub mod error;
pub mod types;

pub use config::MediascopeConfig;
pub use error::{MediaError, Result};
pub use types::*;
