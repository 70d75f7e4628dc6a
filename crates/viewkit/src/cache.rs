//! Cache of composed templates.
//!
//! A composition is identified by a [`CacheKey`]: the ordered list of file
//! names, primary first. The key is structured rather than a joined string, so
//! a name containing the `,` separator cannot collide with a different list.
//! Order is significant: `[page, a, b]` and `[page, b, a]` are different
//! compositions.
//!
//! The cache is cleared wholesale, never per entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::compiler::ComposedTemplate;

/// Ordered list of template names that make up one composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    /// Builds a key from the primary template and its layouts, in order.
    pub fn new<I, S>(primary: &str, layouts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = vec![primary.to_string()];
        names.extend(layouts.into_iter().map(Into::into));
        Self(names)
    }

    /// The primary template name.
    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    /// The layout names, innermost first.
    pub fn layouts(&self) -> &[String] {
        &self.0[1..]
    }

    /// Every name in the composition, primary first.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// The template executed for this composition: the outermost layout, or
    /// the primary when there are none.
    pub fn entry(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Thread-safe map from [`CacheKey`] to compiled composition.
///
/// Lookups take a read lock; inserts and clears take the write lock. Two
/// threads compiling the same key may both insert; the last one wins.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<CacheKey, Arc<ComposedTemplate>>>,
}

impl TemplateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached composition for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<ComposedTemplate>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores `template` under `key`, replacing any previous entry.
    pub fn insert(&self, key: CacheKey, template: Arc<ComposedTemplate>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, template);
    }

    /// Drops every entry at once.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *entries = HashMap::new();
    }

    /// Returns the cached keys, sorted.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Returns the number of cached compositions.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
