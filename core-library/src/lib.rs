//! # Library Module
//!
//! Catalog models, catalog collaborators and the caches that sit in front of
//! them.
//!
//! ## Overview
//!
//! This module manages:
//! - Domain models for songs, albums, artists and playlists
//! - `CatalogClient` / `CatalogProvider` fetch collaborators
//! - The per-server persisted `OfflineCache` and the in-memory `QueryCache`
//! - `CatalogResolver`, the cache-first lookup used by playback and downloads

pub mod cache;
pub mod catalog;
pub mod error;
pub mod models;
pub mod resolver;

pub use cache::{CacheKey, OfflineCache, QueryCache};
pub use catalog::{CatalogClient, CatalogProvider, StaticCatalogProvider};
pub use error::{LibraryError, Result};
pub use resolver::CatalogResolver;
