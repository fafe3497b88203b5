//! Content fingerprints and the duplicate upload check.
//!
//! Published images carry a `md5sum:<hex>` marker in their provenance notes.
//! The marker name predates any choice of digest, but the digest must stay
//! MD5 for markers written by earlier deployments to keep matching.

use md5::{Digest, Md5};
use sha2::Sha256;
use std::fmt;

use crate::db::PublicImage;

pub const MARKER_PREFIX: &str = "md5sum:";

/// MD5 of a file's bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Md5::digest(bytes)))
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().to_ascii_lowercase();
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The text embedded in provenance notes.
    pub fn marker(&self) -> String {
        format!("{}{}", MARKER_PREFIX, self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct HashResult {
    pub md5: ContentDigest,
    pub sha256: String,
}

pub fn calculate_hashes(bytes: &[u8]) -> HashResult {
    HashResult {
        md5: ContentDigest::of(bytes),
        sha256: format!("{:x}", Sha256::digest(bytes)),
    }
}

/// All digest markers found in a notes field. Markers may sit on their own
/// line or among other words.
pub fn markers_in(notes: &str) -> Vec<ContentDigest> {
    notes
        .split_whitespace()
        .filter_map(|word| word.strip_prefix(MARKER_PREFIX))
        .filter_map(|hex| {
            let hex: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
            ContentDigest::from_hex(&hex)
        })
        .collect()
}

pub fn notes_contain(notes: &str, digest: &ContentDigest) -> bool {
    markers_in(notes).iter().any(|found| found == digest)
}

/// Whether `bytes` are identical to an image already on a person's record.
///
/// Read-only and advisory: two uploads racing each other can both pass.
pub fn is_duplicate(existing: &[PublicImage], bytes: &[u8]) -> bool {
    let digest = ContentDigest::of(bytes);
    is_duplicate_digest(existing, &digest)
}

pub fn is_duplicate_digest(existing: &[PublicImage], digest: &ContentDigest) -> bool {
    existing
        .iter()
        .filter_map(|image| image.notes.as_deref())
        .any(|notes| notes_contain(notes, digest))
}
