//! High-level cache coordinator.
//!
//! [`BuildCache`] ties the dependency graph and the four generational
//! stores into a single interface for the build pipeline: cache-or-compute
//! accessors per artifact kind, ambient-type change detection, dependency
//! registration, and the cycle-boundary lifecycle (`clean`, `done`).
//! All reads are fail-safe: corruption results in recomputation rather
//! than errors.

use std::path::{Path, PathBuf};

use strata_common::Fingerprint;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::graph::DepGraph;
use crate::store::GenerationStore;

/// The kinds of artifact this cache persists, one store per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Compiled output (code plus source map).
    CompiledOutput,

    /// Syntactic diagnostics for a single file.
    SyntacticDiagnostics,

    /// Semantic diagnostics, which depend on imports and ambient types.
    SemanticDiagnostics,

    /// Presence-only manifest of the ambient-type set.
    AmbientTypes,
}

impl ArtifactKind {
    /// Directory name of this kind's store under the cache directory.
    fn dir_name(self) -> &'static str {
        match self {
            Self::CompiledOutput => "output",
            Self::SyntacticDiagnostics => "syntactic",
            Self::SemanticDiagnostics => "semantic",
            Self::AmbientTypes => "types",
        }
    }
}

/// Coordinator for the incremental build cache.
///
/// Owns one dependency graph and four generational stores rooted at
/// `<cache_root>/<config_fingerprint>/<kind>/`. Constructed with no cache
/// root, it runs with null stores: every lookup misses and nothing
/// persists. The graph and its dirty flags live as long as the
/// coordinator; they are not reset by [`done`](Self::done) or
/// [`clean`](Self::clean). All mutation must be serialized by the caller.
pub struct BuildCache {
    /// Root directory holding one subdirectory per configuration.
    cache_root: Option<PathBuf>,

    /// This configuration's cache directory (`<root>/<config fingerprint>`).
    cache_dir: Option<PathBuf>,

    /// Import graph with per-artifact dirty flags.
    graph: DepGraph,

    output: GenerationStore,
    syntactic: GenerationStore,
    semantic: GenerationStore,
    types: GenerationStore,
}

impl BuildCache {
    /// Creates a coordinator for the given configuration.
    ///
    /// With `cache_root` present, stores are disk-backed under a directory
    /// named by the configuration fingerprint; any configuration change
    /// selects a fresh directory and orphans the previous one. With no
    /// root, caching is disabled and every operation is a miss or no-op.
    /// An unusable root surfaces as [`CacheError::Io`].
    pub fn new(cache_root: Option<&Path>, config: &CacheConfig) -> Result<Self, CacheError> {
        match cache_root {
            None => Ok(Self {
                cache_root: None,
                cache_dir: None,
                graph: DepGraph::new(),
                output: GenerationStore::Null,
                syntactic: GenerationStore::Null,
                semantic: GenerationStore::Null,
                types: GenerationStore::Null,
            }),
            Some(root) => {
                let dir = root.join(config.fingerprint().to_string());
                let (output, syntactic, semantic, types) = Self::open_stores(&dir)?;
                Ok(Self {
                    cache_root: Some(root.to_path_buf()),
                    cache_dir: Some(dir),
                    graph: DepGraph::new(),
                    output,
                    syntactic,
                    semantic,
                    types,
                })
            }
        }
    }

    fn open_stores(
        dir: &Path,
    ) -> Result<(GenerationStore, GenerationStore, GenerationStore, GenerationStore), CacheError>
    {
        Ok((
            GenerationStore::rolling(&dir.join(ArtifactKind::CompiledOutput.dir_name()))?,
            GenerationStore::rolling(&dir.join(ArtifactKind::SyntacticDiagnostics.dir_name()))?,
            GenerationStore::rolling(&dir.join(ArtifactKind::SemanticDiagnostics.dir_name()))?,
            GenerationStore::rolling(&dir.join(ArtifactKind::AmbientTypes.dir_name()))?,
        ))
    }

    fn store(&self, kind: ArtifactKind) -> &GenerationStore {
        match kind {
            ArtifactKind::CompiledOutput => &self.output,
            ArtifactKind::SyntacticDiagnostics => &self.syntactic,
            ArtifactKind::SemanticDiagnostics => &self.semantic,
            ArtifactKind::AmbientTypes => &self.types,
        }
    }

    fn store_mut(&mut self, kind: ArtifactKind) -> &mut GenerationStore {
        match kind {
            ArtifactKind::CompiledOutput => &mut self.output,
            ArtifactKind::SyntacticDiagnostics => &mut self.syntactic,
            ArtifactKind::SemanticDiagnostics => &mut self.semantic,
            ArtifactKind::AmbientTypes => &mut self.types,
        }
    }

    /// Registers the import edge "a change to `importee` can dirty `importer`".
    ///
    /// Called by the module-resolution layer as it discovers imports.
    pub fn set_dependency(&mut self, importee: &str, importer: &str) {
        self.graph.set_dependency(importee, importer);
    }

    /// Visits every known artifact, dependencies before dependents.
    ///
    /// On a cyclic import graph the ordering guarantee degrades to
    /// arbitrary order; every artifact is still visited exactly once.
    pub fn walk(&self, visit: impl FnMut(&str)) {
        self.graph.walk(visit);
    }

    /// Returns the compiled output for `id`, cached or freshly computed.
    ///
    /// Reuses the stored entry when `key` is cached and the artifact's own
    /// content is unchanged; compiled output does not depend on imports,
    /// so the dirty check is non-transitive. A reused entry is re-written
    /// to refresh its presence in the current generation.
    pub fn compiled_output<F>(
        &mut self,
        id: &str,
        key: Fingerprint,
        compute: F,
    ) -> Result<Option<Vec<u8>>, CacheError>
    where
        F: FnOnce() -> Option<Vec<u8>>,
    {
        self.cached_or_compute(ArtifactKind::CompiledOutput, id, key, false, compute)
    }

    /// Returns the syntactic diagnostics for `id`, cached or computed.
    ///
    /// Diagnostics depend on imported files and ambient types, so the
    /// dirty check is transitive.
    pub fn syntactic_diagnostics<F>(
        &mut self,
        id: &str,
        key: Fingerprint,
        compute: F,
    ) -> Result<Option<Vec<u8>>, CacheError>
    where
        F: FnOnce() -> Option<Vec<u8>>,
    {
        self.cached_or_compute(ArtifactKind::SyntacticDiagnostics, id, key, true, compute)
    }

    /// Returns the semantic diagnostics for `id`, cached or computed.
    ///
    /// Same transitive dirty check as syntactic diagnostics.
    pub fn semantic_diagnostics<F>(
        &mut self,
        id: &str,
        key: Fingerprint,
        compute: F,
    ) -> Result<Option<Vec<u8>>, CacheError>
    where
        F: FnOnce() -> Option<Vec<u8>>,
    {
        self.cached_or_compute(ArtifactKind::SemanticDiagnostics, id, key, true, compute)
    }

    fn cached_or_compute<F>(
        &mut self,
        kind: ArtifactKind,
        id: &str,
        key: Fingerprint,
        transitive: bool,
        compute: F,
    ) -> Result<Option<Vec<u8>>, CacheError>
    where
        F: FnOnce() -> Option<Vec<u8>>,
    {
        if !self.graph.is_dirty(id, transitive) && self.store(kind).exists(&key) {
            match self.store(kind).read(&key) {
                Some(bytes) => {
                    self.store_mut(kind).write(&key, Some(&bytes))?;
                    return Ok(Some(bytes));
                }
                None => {
                    tracing::warn!(
                        "unreadable cache entry for {id} at {}; recomputing",
                        self.store(kind).display_path(&key).display()
                    );
                }
            }
        }

        // An absent result is the "do not cache" sentinel; it flows
        // through unchanged and the write no-ops.
        let value = compute();
        self.store_mut(kind).write(&key, value.as_deref())?;
        self.graph.mark_dirty(id);
        Ok(value)
    }

    /// Compares the current ambient-type set against the last cycle's.
    ///
    /// Returns `true` if the sets differ, in which case every file's
    /// semantic results are considered stale for the rest of the cycle.
    /// The current set is recorded in the in-progress generation either
    /// way, so the next cycle compares against it.
    pub fn sync_ambient_types(
        &mut self,
        fingerprints: &[Fingerprint],
    ) -> Result<bool, CacheError> {
        let changed = !self.types.matches(fingerprints);
        if changed {
            self.graph.set_ambient_dirty();
            tracing::debug!("ambient type set changed; semantic results invalidated");
        }
        for fp in fingerprints {
            self.types.touch(fp)?;
        }
        Ok(changed)
    }

    /// Returns an entry's stable display location for log reporting.
    ///
    /// Always addresses the stable generation; does not imply the entry
    /// is present there.
    pub fn entry_path(&self, kind: ArtifactKind, key: &Fingerprint) -> PathBuf {
        self.store(kind).display_path(key)
    }

    /// Removes all cached state from disk and reinitializes empty stores.
    ///
    /// Removes the entire cache root, including directories orphaned by
    /// configuration changes. Dependency graph state is not reset.
    pub fn clean(&mut self) -> Result<(), CacheError> {
        let Some(root) = self.cache_root.clone() else {
            return Ok(());
        };
        if root.exists() {
            std::fs::remove_dir_all(&root).map_err(|e| CacheError::Io {
                path: root.clone(),
                source: e,
            })?;
        }

        let dir = self.cache_dir.clone().unwrap_or(root);
        let (output, syntactic, semantic, types) = Self::open_stores(&dir)?;
        self.output = output;
        self.syntactic = syntactic;
        self.semantic = semantic;
        self.types = types;
        Ok(())
    }

    /// Ends the build cycle, promoting every store's in-progress
    /// generation to stable.
    ///
    /// Must be called exactly once per cycle, after all per-artifact work;
    /// skipping it discards the cycle's results at the next construction.
    /// The coordinator remains usable for the next cycle: fresh store
    /// handles are opened on the rotated directories.
    pub fn done(&mut self) -> Result<(), CacheError> {
        self.output.roll()?;
        self.syntactic.roll()?;
        self.semantic.roll()?;
        self.types.roll()?;

        if let Some(dir) = self.cache_dir.clone() {
            let (output, syntactic, semantic, types) = Self::open_stores(&dir)?;
            self.output = output;
            self.syntactic = syntactic;
            self.semantic = semantic;
            self.types = types;
        }
        Ok(())
    }
}
