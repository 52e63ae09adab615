//! Caller-owned, content-addressed cache for generated flow previews.

use ahash::AHashMap;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 over (flow name, flow description, project context), hex encoded.
///
/// Each part is length-prefixed, so moving text between parts changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(flow_name: &str, flow_description: &str, project_context: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [flow_name, flow_description, project_context] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct PreviewCache<V> {
    entries: AHashMap<Fingerprint, V>,
}

impl<V> Default for PreviewCache<V> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }
}

impl<V> PreviewCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Fingerprint) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: Fingerprint, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Returns the cached value, generating and storing it on a miss.
    pub fn get_or_insert_with(&mut self, key: Fingerprint, generate: impl FnOnce() -> V) -> &V {
        self.entries.entry(key).or_insert_with(generate)
    }

    pub fn remove(&mut self, key: &Fingerprint) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
