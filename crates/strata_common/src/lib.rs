//! Shared foundational types for the Strata build pipeline.
//!
//! This crate provides the content fingerprint used as the cache key type
//! throughout the incremental build system.

#![warn(missing_docs)]

pub mod hash;

pub use hash::Fingerprint;
