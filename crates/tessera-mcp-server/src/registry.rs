//! Keyed handler registries with tag indexes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

/// A name→handler map plus a tag index, shared by all four handler kinds.
///
/// Registration replaces any previous entry under the same key; listing is
/// in sorted-key order so pagination cursors stay stable between calls.
pub struct Registry<H> {
    entries: RwLock<HashMap<String, Arc<H>>>,
    tag_index: RwLock<HashMap<String, HashSet<String>>>,
}

impl<H> Registry<H> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            tag_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, key: impl Into<String>, handler: Arc<H>, tags: &[String]) {
        let key = key.into();
        if let Some(_previous) = self.entries.write().insert(key.clone(), handler) {
            self.remove_from_tag_index(&key);
        }
        let mut tag_index = self.tag_index.write();
        for tag in tags {
            tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<H>> {
        self.entries.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Arc<H>> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            self.remove_from_tag_index(key);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.tag_index.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// All handlers in sorted-key order.
    pub fn values_sorted(&self) -> Vec<Arc<H>> {
        let entries = self.entries.read();
        let mut pairs: Vec<(&String, &Arc<H>)> = entries.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs.into_iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    /// Keys registered under a tag, sorted.
    pub fn keys_by_tag(&self, tag: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tag_index
            .read()
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn remove_from_tag_index(&self, key: &str) {
        let mut tag_index = self.tag_index.write();
        tag_index.retain(|_, keys| {
            keys.remove(key);
            !keys.is_empty()
        });
    }
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}
