//! Texture handle cache keyed by source identity.

use std::collections::HashMap;

use crate::import::TextureKind;

/// A cached handle plus the kind it was first requested as.
#[derive(Debug, Clone)]
pub struct CacheEntry<H> {
    pub kind: TextureKind,
    pub handle: H,
}

/// Get-or-create cache that runs the expensive decode/upload step at most once
/// per distinct source.
///
/// The handle type is generic so the cache itself needs no GPU device: the
/// renderer stores shared texture handles, unit tests store counters.
#[derive(Debug)]
pub struct TextureCache<H> {
    entries: HashMap<String, CacheEntry<H>>,
}

impl<H> Default for TextureCache<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<H: Clone> TextureCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the entry for `key`, building it with `create` on first sight.
    ///
    /// `create` runs at most once per key. Later hits reuse the stored entry,
    /// including its original kind, even when the request asks for another.
    pub fn load(
        &mut self,
        key: &str,
        kind: TextureKind,
        create: impl FnOnce() -> H,
    ) -> CacheEntry<H> {
        if let Some(entry) = self.entries.get(key) {
            return entry.clone();
        }
        let entry = CacheEntry {
            kind,
            handle: create(),
        };
        self.entries.insert(key.to_owned(), entry.clone());
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
