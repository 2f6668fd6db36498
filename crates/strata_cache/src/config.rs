//! Cache configuration and the per-configuration fingerprint.
//!
//! Everything that can change the meaning of a compilation — the root file
//! list, compiler options, build-tool configuration, compiler version —
//! is hashed into a single fingerprint that names the cache directory.
//! Any change selects a fresh directory, invalidating the cache wholesale;
//! the previous directory is orphaned, not deleted.

use serde::{Deserialize, Serialize};
use strata_common::Fingerprint;

/// Cache schema version. Increment on breaking changes to the on-disk
/// layout; old cache directories are then simply never consulted again.
pub const SCHEMA_VERSION: u32 = 1;

/// The compilation configuration a cache directory is bound to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root files of the compilation, in compilation order.
    pub root_files: Vec<String>,

    /// Serialized compiler options.
    pub compiler_options: String,

    /// Serialized build-tool configuration.
    pub tool_config: String,

    /// Version string of the compiler producing the artifacts.
    pub compiler_version: String,
}

impl CacheConfig {
    /// Computes the fingerprint naming this configuration's cache directory.
    ///
    /// Every field is length-prefixed into the hash buffer so field
    /// boundaries are unambiguous. Deterministic across processes.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut buf = Vec::new();
        buf.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());

        buf.extend_from_slice(&(self.root_files.len() as u64).to_le_bytes());
        for file in &self.root_files {
            push_str(&mut buf, file);
        }
        push_str(&mut buf, &self.compiler_options);
        push_str(&mut buf, &self.tool_config);
        push_str(&mut buf, &self.compiler_version);

        Fingerprint::from_bytes(&buf)
    }
}

fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CacheConfig {
        CacheConfig {
            root_files: vec!["src/main.st".to_string(), "src/lib.st".to_string()],
            compiler_options: "--strict --target es2020".to_string(),
            tool_config: "mode=production".to_string(),
            compiler_version: "5.2.0".to_string(),
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(base_config().fingerprint(), base_config().fingerprint());
    }

    #[test]
    fn any_field_change_changes_fingerprint() {
        let base = base_config().fingerprint();

        let mut c = base_config();
        c.root_files.push("src/extra.st".to_string());
        assert_ne!(c.fingerprint(), base);

        let mut c = base_config();
        c.compiler_options = "--target es5".to_string();
        assert_ne!(c.fingerprint(), base);

        let mut c = base_config();
        c.tool_config = "mode=development".to_string();
        assert_ne!(c.fingerprint(), base);

        let mut c = base_config();
        c.compiler_version = "5.3.0".to_string();
        assert_ne!(c.fingerprint(), base);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = CacheConfig {
            compiler_options: "xy".to_string(),
            tool_config: "z".to_string(),
            ..Default::default()
        };
        let b = CacheConfig {
            compiler_options: "x".to_string(),
            tool_config: "yz".to_string(),
            ..Default::default()
        };
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn root_file_order_matters() {
        let a = CacheConfig {
            root_files: vec!["a.st".to_string(), "b.st".to_string()],
            ..Default::default()
        };
        let b = CacheConfig {
            root_files: vec!["b.st".to_string(), "a.st".to_string()],
            ..Default::default()
        };
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
