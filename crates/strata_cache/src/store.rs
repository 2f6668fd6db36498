//! Double-buffered generational artifact storage.
//!
//! Each store keeps two on-disk generations: `old`, the stable output of
//! the last completed build cycle, and `new`, the write target for the
//! current cycle. Reads consult `new` first and fall back to `old`, so a
//! cycle can reuse still-valid prior results while trusting freshly
//! written ones. [`RollingStore::roll`] atomically promotes `new` to
//! `old`; a crash mid-cycle leaves the previous generation fully intact.
//!
//! Every non-empty entry is framed with a validated header (magic bytes,
//! format version, payload checksum). Corrupt or truncated leaves read
//! back as cache misses, never as errors.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::Fingerprint;

use crate::error::CacheError;

/// Directory name of the stable generation from the last completed cycle.
const OLD_DIR: &str = "old";

/// Directory name of the in-progress generation.
const NEW_DIR: &str = "new";

/// Magic bytes identifying a Strata cache entry.
const ENTRY_MAGIC: [u8; 4] = *b"STRA";

/// Current entry format version. Increment on breaking changes to the
/// header or payload framing.
const ENTRY_FORMAT_VERSION: u32 = 1;

/// Header prepended to every non-empty cached entry for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryHeader {
    /// Magic bytes: must be `b"STRA"`.
    magic: [u8; 4],

    /// Entry format version.
    format_version: u32,

    /// Fingerprint of the payload data (for integrity checks).
    checksum: Fingerprint,
}

/// Frames a payload as: 4-byte header length (little-endian) + header + payload.
fn encode_entry(payload: &[u8]) -> Result<Vec<u8>, CacheError> {
    let header = EntryHeader {
        magic: ENTRY_MAGIC,
        format_version: ENTRY_FORMAT_VERSION,
        checksum: Fingerprint::from_bytes(payload),
    };

    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Unframes an entry, validating magic, format version, and checksum.
///
/// Returns `None` on any mismatch; corruption is a cache miss.
fn decode_entry(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < 4 {
        return None;
    }

    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    if raw.len() < 4 + header_len {
        return None;
    }

    let header: EntryHeader =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .ok()?
            .0;

    if header.magic != ENTRY_MAGIC {
        return None;
    }
    if header.format_version != ENTRY_FORMAT_VERSION {
        return None;
    }

    let payload = &raw[4 + header_len..];
    if Fingerprint::from_bytes(payload) != header.checksum {
        return None;
    }

    Some(payload.to_vec())
}

/// A double-buffered on-disk store with `old` and `new` generations.
///
/// Opening the store clears any partial `new` generation left behind by an
/// aborted prior cycle; `old` is left untouched and stays queryable for
/// the whole cycle. After [`roll`](Self::roll) the instance becomes inert:
/// every operation reports miss or no-ops, protecting late-held handles.
pub struct RollingStore {
    /// Root directory holding the `old` and `new` generation directories.
    root: PathBuf,

    /// Latched by `roll()`; all operations are inert afterwards.
    rolled: bool,
}

impl RollingStore {
    /// Opens a store rooted at the given directory.
    ///
    /// Discards any leftover `new` generation and creates both generation
    /// directories. This is the sole recovery path after an aborted cycle.
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        let new_dir = root.join(NEW_DIR);
        if new_dir.exists() {
            std::fs::remove_dir_all(&new_dir).map_err(|e| CacheError::Io {
                path: new_dir.clone(),
                source: e,
            })?;
        }
        std::fs::create_dir_all(&new_dir).map_err(|e| CacheError::Io {
            path: new_dir,
            source: e,
        })?;

        let old_dir = root.join(OLD_DIR);
        std::fs::create_dir_all(&old_dir).map_err(|e| CacheError::Io {
            path: old_dir,
            source: e,
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            rolled: false,
        })
    }

    fn entry_path(&self, generation: &str, key: &Fingerprint) -> PathBuf {
        self.root.join(generation).join(key.to_string())
    }

    /// Returns `true` if an entry file for `key` is present in either generation.
    ///
    /// Presence does not imply readability; a corrupt entry still exists.
    pub fn exists(&self, key: &Fingerprint) -> bool {
        if self.rolled {
            return false;
        }
        self.entry_path(NEW_DIR, key).exists() || self.entry_path(OLD_DIR, key).exists()
    }

    /// Reads an entry, consulting the `new` generation before `old`.
    ///
    /// A zero-byte marker (from [`touch`](Self::touch)) reads back as an
    /// empty payload. Returns `None` for missing, corrupt, or truncated
    /// entries, and for every key once the store has rolled.
    pub fn read(&self, key: &Fingerprint) -> Option<Vec<u8>> {
        if self.rolled {
            return None;
        }

        let new_path = self.entry_path(NEW_DIR, key);
        let path = if new_path.exists() {
            new_path
        } else {
            self.entry_path(OLD_DIR, key)
        };

        let raw = std::fs::read(path).ok()?;
        if raw.is_empty() {
            return Some(Vec::new());
        }
        decode_entry(&raw)
    }

    /// Writes an entry into the `new` generation.
    ///
    /// An absent `value` is the "do not cache this result" sentinel and is
    /// a no-op, as is any write after the store has rolled.
    pub fn write(&mut self, key: &Fingerprint, value: Option<&[u8]>) -> Result<(), CacheError> {
        if self.rolled {
            return Ok(());
        }
        let Some(payload) = value else {
            return Ok(());
        };

        let framed = encode_entry(payload)?;
        let path = self.entry_path(NEW_DIR, key);
        std::fs::write(&path, &framed).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Creates a zero-byte marker for `key` in the `new` generation.
    ///
    /// Used for presence-only tracking; the file's existence is the signal.
    pub fn touch(&mut self, key: &Fingerprint) -> Result<(), CacheError> {
        if self.rolled {
            return Ok(());
        }
        let path = self.entry_path(NEW_DIR, key);
        std::fs::write(&path, []).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Returns `true` iff the `old` generation's key set equals `names` as a set.
    pub fn matches(&self, names: &[Fingerprint]) -> bool {
        if self.rolled {
            return false;
        }

        let mut stored = HashSet::new();
        if let Ok(entries) = std::fs::read_dir(self.root.join(OLD_DIR)) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    stored.insert(name.to_string());
                }
            }
        }

        let wanted: HashSet<String> = names.iter().map(|f| f.to_string()).collect();
        stored == wanted
    }

    /// Returns the entry's stable location in the `old` generation.
    ///
    /// For log reporting only; does not imply the key is present there.
    pub fn display_path(&self, key: &Fingerprint) -> PathBuf {
        self.entry_path(OLD_DIR, key)
    }

    /// Atomically promotes the `new` generation to be the new `old`.
    ///
    /// Removes `old`, then renames `new` into its place; if nothing was
    /// written this cycle, `old` becomes empty. Idempotent: rolling an
    /// already-rolled store is a no-op. All other operations on this
    /// instance are inert afterwards.
    pub fn roll(&mut self) -> Result<(), CacheError> {
        if self.rolled {
            return Ok(());
        }

        let old_dir = self.root.join(OLD_DIR);
        let new_dir = self.root.join(NEW_DIR);

        if old_dir.exists() {
            std::fs::remove_dir_all(&old_dir).map_err(|e| CacheError::Io {
                path: old_dir.clone(),
                source: e,
            })?;
        }

        if new_dir.exists() {
            std::fs::rename(&new_dir, &old_dir).map_err(|e| CacheError::Io {
                path: new_dir,
                source: e,
            })?;
        } else {
            std::fs::create_dir_all(&old_dir).map_err(|e| CacheError::Io {
                path: old_dir,
                source: e,
            })?;
        }

        self.rolled = true;
        Ok(())
    }
}

/// A generational store: either the always-miss null variant used when
/// caching is disabled, or a disk-backed [`RollingStore`].
///
/// The variant is selected once at construction; every operation
/// dispatches on it.
pub enum GenerationStore {
    /// Zero-persistence variant: every read misses, every write no-ops.
    Null,

    /// Disk-backed double-buffered variant.
    Rolling(RollingStore),
}

impl GenerationStore {
    /// Opens a disk-backed store rooted at the given directory.
    pub fn rolling(root: &Path) -> Result<Self, CacheError> {
        Ok(Self::Rolling(RollingStore::open(root)?))
    }

    /// Returns `true` if an entry file for `key` is present.
    pub fn exists(&self, key: &Fingerprint) -> bool {
        match self {
            Self::Null => false,
            Self::Rolling(store) => store.exists(key),
        }
    }

    /// Reads an entry; `None` on miss or corruption.
    pub fn read(&self, key: &Fingerprint) -> Option<Vec<u8>> {
        match self {
            Self::Null => None,
            Self::Rolling(store) => store.read(key),
        }
    }

    /// Writes an entry into the current generation; absent values no-op.
    pub fn write(&mut self, key: &Fingerprint, value: Option<&[u8]>) -> Result<(), CacheError> {
        match self {
            Self::Null => Ok(()),
            Self::Rolling(store) => store.write(key, value),
        }
    }

    /// Creates a presence-only marker for `key`.
    pub fn touch(&mut self, key: &Fingerprint) -> Result<(), CacheError> {
        match self {
            Self::Null => Ok(()),
            Self::Rolling(store) => store.touch(key),
        }
    }

    /// Set-equality check of `names` against the stable generation.
    ///
    /// The null variant always reports `false`, which forces ambient-type
    /// dirtiness every cycle; acceptable, since nothing is cached anyway.
    pub fn matches(&self, names: &[Fingerprint]) -> bool {
        match self {
            Self::Null => false,
            Self::Rolling(store) => store.matches(names),
        }
    }

    /// Stable display location of an entry, for log reporting only.
    pub fn display_path(&self, key: &Fingerprint) -> PathBuf {
        match self {
            Self::Null => PathBuf::from("<null>").join(key.to_string()),
            Self::Rolling(store) => store.display_path(key),
        }
    }

    /// Promotes the in-progress generation to stable.
    pub fn roll(&mut self) -> Result<(), CacheError> {
        match self {
            Self::Null => Ok(()),
            Self::Rolling(store) => store.roll(),
        }
    }
}
