//! Compiled template cache keyed by source text.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::error::Result;
use crate::Template;

/// Least-recently-used cache of compiled templates.
///
/// Compilation failures are not cached; the same source fails again on the
/// next lookup.
#[derive(Debug)]
pub struct TemplateCache {
    templates: LruCache<String, Arc<Template>>,
    hits: u64,
    misses: u64,
}

impl TemplateCache {
    /// A cache holding at most `capacity` templates. Zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            templates: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// The compiled form of `source`, compiling and caching it on a miss.
    pub fn get_or_compile(&mut self, source: &str) -> Result<Arc<Template>> {
        if let Some(template) = self.templates.get(source) {
            self.hits += 1;
            log::trace!("template cache hit ({} bytes)", source.len());
            return Ok(Arc::clone(template));
        }
        self.misses += 1;
        log::debug!("template cache miss; compiling {} bytes", source.len());
        let template = Arc::new(Template::compile(source)?);
        self.templates
            .put(source.to_string(), Arc::clone(&template));
        Ok(template)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.templates.cap().get()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateError;

    #[test]
    fn hits_after_first_compile() {
        let mut cache = TemplateCache::new(4);
        let first = cache.get_or_compile("a {:b}").unwrap();
        let second = cache.get_or_compile("a {:b}").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = TemplateCache::new(2);
        let a = cache.get_or_compile("a").unwrap();
        cache.get_or_compile("b").unwrap();
        cache.get_or_compile("a").unwrap();
        cache.get_or_compile("c").unwrap();
        assert_eq!(cache.len(), 2);
        // "b" was evicted, "a" survived
        assert!(Arc::ptr_eq(&a, &cache.get_or_compile("a").unwrap()));
        cache.get_or_compile("b").unwrap();
        assert_eq!(cache.misses(), 4);
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache = TemplateCache::new(2);
        assert_eq!(
            cache.get_or_compile("{").unwrap_err(),
            TemplateError::UnbalancedBrace { offset: 0 }
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut cache = TemplateCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.get_or_compile("x").unwrap();
        cache.get_or_compile("y").unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
