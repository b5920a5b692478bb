// SPDX-License-Identifier: MIT

//! Hashing helpers shared by the callback map, dedup store, and workspace identity.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex-encode the first `n` bytes of the SHA-256 digest of `input`.
///
/// `n` is clamped to the digest length (32 bytes); callers pass small values
/// (4, 8, 16) so the clamp never triggers in practice.
pub fn short_hash(input: &str, n: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let n = n.min(digest.len());
    digest[..n].iter().map(|b| format!("{b:02x}")).collect()
}

/// A workspace's canonical identifier in wire contexts: the first 8 hex
/// characters of the SHA-256 digest of its absolute path.
///
/// Invariant: callers must pass an absolute path. This function does not
/// canonicalize (symlink-resolve) the path — two different-looking absolute
/// paths to the same directory hash differently, matching the workspace
/// registry's own path-keyed lookup.
pub fn workspace_hash(absolute_path: &Path) -> String {
    short_hash(&absolute_path.to_string_lossy(), 4)
}
