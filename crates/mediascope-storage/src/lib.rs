//! Mediascope Storage crate - pooled SQLite persistence for feature vectors.
//!
//! Provides a WAL-mode connection pool with migrations, a registered
//! `cosine_distance` SQL function, and the [`MediaStore`] seam with its
//! SQLite implementation.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod similarity;
pub mod store;

pub use db::{Database, DatabaseOptions};
pub use repository::MediaRepository;
pub use store::MediaStore;
