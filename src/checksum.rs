//! Corpus checksums
//!
//! A SHA-256 over every processed unit, in enumeration order. Stored in the
//! snapshot's metadata so two stores built from the same corpus can be
//! recognized as identical.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, content: &[u8]) -> bool {
        Self::from_bytes(content) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Incremental checksum over (unit id, content) pairs
#[derive(Default)]
pub struct CorpusHasher {
    hasher: Sha256,
    units: usize,
}

impl CorpusHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one unit. The id is length-prefixed so boundaries cannot shift.
    pub fn update(&mut self, unit_id: &str, content: &[u8]) {
        self.hasher.update((unit_id.len() as u64).to_le_bytes());
        self.hasher.update(unit_id.as_bytes());
        self.hasher.update((content.len() as u64).to_le_bytes());
        self.hasher.update(content);
        self.units += 1;
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn finish(self) -> Checksum {
        Checksum(format!("{:x}", self.hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = b"class A implements INode {}";
        assert_eq!(Checksum::from_bytes(content), Checksum::from_bytes(content));
        assert!(Checksum::from_bytes(content).verify(content));
        assert_eq!(Checksum::from_bytes(content).as_str().len(), 64);
    }

    #[test]
    fn test_corpus_order_matters() {
        let mut a = CorpusHasher::new();
        a.update("a.ts", b"one");
        a.update("b.ts", b"two");

        let mut b = CorpusHasher::new();
        b.update("b.ts", b"two");
        b.update("a.ts", b"one");

        assert_eq!(a.units(), 2);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_unit_boundaries() {
        let mut a = CorpusHasher::new();
        a.update("ab", b"c");
        let mut b = CorpusHasher::new();
        b.update("a", b"bc");
        assert_ne!(a.finish(), b.finish());
    }
}
