//! Interned tag collections
//!
//! Ways sharing the same tags (very common: thousands of `highway=residential`
//! segments) share one `TagsId`. Entries are immutable once added.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use wayroute_common::{Error, Result};

/// Compact handle into a [`TagsIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagsId(pub u32);

/// Ordered list of `(key, value)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSet {
    pairs: Vec<(String, String)>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Deduplicating store of tag sets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsIndex {
    sets: Vec<TagSet>,
    #[serde(skip)]
    lookup: FxHashMap<TagSet, TagsId>,
}

impl TagsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `tags`, returning the existing handle for an identical set
    pub fn add(&mut self, tags: TagSet) -> TagsId {
        if let Some(&id) = self.lookup.get(&tags) {
            return id;
        }
        let id = TagsId(self.sets.len() as u32);
        self.lookup.insert(tags.clone(), id);
        self.sets.push(tags);
        id
    }

    pub fn get(&self, id: TagsId) -> Result<&TagSet> {
        self.sets.get(id.0 as usize).ok_or(Error::InvalidTagsId {
            id: id.0,
            count: self.sets.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Rebuild the lookup table after deserialization
    pub(crate) fn reindex(&mut self) {
        self.lookup = self
            .sets
            .iter()
            .enumerate()
            .map(|(i, set)| (set.clone(), TagsId(i as u32)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_sets_share_handle() {
        let mut index = TagsIndex::new();
        let a = index.add(TagSet::new().with("highway", "residential"));
        let b = index.add(TagSet::new().with("highway", "primary"));
        let c = index.add(TagSet::new().with("highway", "residential"));

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_order_is_significant() {
        let mut index = TagsIndex::new();
        let a = index.add(TagSet::new().with("highway", "primary").with("oneway", "yes"));
        let b = index.add(TagSet::new().with("oneway", "yes").with("highway", "primary"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_and_lookup() {
        let mut index = TagsIndex::new();
        let id = index.add([("highway", "service"), ("maxspeed", "20")].into_iter().collect());
        let tags = index.get(id).unwrap();
        assert_eq!(tags.get("maxspeed"), Some("20"));
        assert!(!tags.has("name"));
        assert!(matches!(
            index.get(TagsId(7)),
            Err(Error::InvalidTagsId { id: 7, count: 1 })
        ));
    }

    #[test]
    fn test_reindex_after_clone_without_lookup() {
        let mut index = TagsIndex::new();
        let id = index.add(TagSet::new().with("highway", "track"));

        let mut restored = TagsIndex {
            sets: index.sets.clone(),
            lookup: FxHashMap::default(),
        };
        restored.reindex();
        assert_eq!(restored.add(TagSet::new().with("highway", "track")), id);
    }
}
