//! Bidirectional tag registry.
//!
//! Tracks which cache keys carry which tags so a tag flush can find every
//! affected entry, and so evicted entries can be forgotten.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// Tracks tag → keys and key → tags mappings.
///
/// Locks are always taken in the order `tag_to_keys`, then `key_to_tags`.
pub struct TagRegistry {
    tag_to_keys: RwLock<HashMap<String, HashSet<String>>>,
    key_to_tags: RwLock<HashMap<String, HashSet<String>>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            tag_to_keys: RwLock::new(HashMap::new()),
            key_to_tags: RwLock::new(HashMap::new()),
        }
    }

    /// Register a key under `tags`, replacing whatever it carried before.
    pub fn register(&self, key: &str, tags: &[String]) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "register");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "register");

        if let Some(previous) = k2t.remove(key) {
            detach(&mut t2k, key, previous);
        }

        let tags: HashSet<String> = tags.iter().cloned().collect();
        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(key.to_string());
        }
        k2t.insert(key.to_string(), tags);
    }

    /// Every key carrying at least one of `tags`.
    pub fn keys_for_tags(&self, tags: &[String]) -> HashSet<String> {
        let t2k = rw_read(&self.tag_to_keys, SOURCE, "keys_for_tags");
        tags.iter()
            .filter_map(|tag| t2k.get(tag))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn tags_for_key(&self, key: &str) -> HashSet<String> {
        rw_read(&self.key_to_tags, SOURCE, "tags_for_key")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget a key. Called on flush, eviction, and expiry.
    pub fn unregister(&self, key: &str) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "unregister");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "unregister");

        if let Some(tags) = k2t.remove(key) {
            detach(&mut t2k, key, tags);
        }
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.tag_to_keys, SOURCE, "tag_count").len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_tags, SOURCE, "key_count").len()
    }
}

fn detach(t2k: &mut HashMap<String, HashSet<String>>, key: &str, tags: HashSet<String>) {
    for tag in tags {
        if let Some(keys) = t2k.get_mut(&tag) {
            keys.remove(key);
            if keys.is_empty() {
                t2k.remove(&tag);
            }
        }
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}
