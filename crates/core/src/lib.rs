//! Core types and shared functionality for havn.
//!
//! This crate provides:
//! - Generation-scoped response cache with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{
    CacheDb, CacheStore, CachedResponse, Generation, GenerationRole, RequestIdentity, SharedStore, active_generation_names,
};
pub use config::AppConfig;
pub use error::Error;
