use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::{fs, path::Path};

use crate::report::model::{ArtifactHash, ArtifactInfo};

/// A compiled module as read from disk.
///
/// The bytes are never modified; the fingerprint lets the operator match
/// a validation result to the exact artifact that was checked.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub path: String,
    pub bytes: Vec<u8>,
    pub sha256_hex: String,
}

impl CompiledModule {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Report-facing metadata. Drops the raw bytes.
    pub fn into_artifact(self) -> ArtifactInfo {
        ArtifactInfo {
            path: Some(self.path),
            size_bytes: self.bytes.len() as u64,
            hash: ArtifactHash {
                algorithm: "sha256".to_string(),
                value: self.sha256_hex,
            },
        }
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Read a compiled module and fingerprint its contents.
pub fn read_artifact(path: &Path) -> Result<CompiledModule> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read artifact: {}", path.display()))?;

    Ok(CompiledModule {
        path: path.display().to_string(),
        sha256_hex: fingerprint(&bytes),
        bytes,
    })
}
