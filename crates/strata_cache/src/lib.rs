//! Incremental build cache for the per-file compilation pipeline.
//!
//! This crate decides whether a previously computed artifact (compiled
//! output, syntactic or semantic diagnostics) may be reused, and where
//! results persist. It provides content-addressed generational stores with
//! crash-safe rotation, a dependency graph with transitive dirty
//! propagation, and the [`BuildCache`] coordinator tying them together.
//! All cache reads are fail-safe: corruption results in a recomputation,
//! never an incorrect result.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod store;

pub use cache::{ArtifactKind, BuildCache};
pub use config::CacheConfig;
pub use error::CacheError;
pub use graph::DepGraph;
pub use store::{GenerationStore, RollingStore};
