//! Per-message URL set.
//!
//! URLs live in a flat arena indexed by [`UrlId`]; the set layers a
//! canonical-form index on top so every distinct URL exists exactly once
//! per message regardless of how many parts mention it.

use std::collections::HashMap;

use crate::Url;

/// Arena handle for a [`Url`] stored in a [`UrlSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UrlId(pub u32);

#[derive(Debug, Default)]
pub struct UrlSet {
    urls: Vec<Url>,
    index: HashMap<String, UrlId>,
}

impl UrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn get(&self, id: UrlId) -> &Url {
        &self.urls[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: UrlId) -> &mut Url {
        &mut self.urls[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (UrlId, &Url)> {
        self.urls
            .iter()
            .enumerate()
            .map(|(i, u)| (UrlId(i as u32), u))
    }

    /// Look up a URL by its canonical string form.
    pub fn find(&self, canonical: &str) -> Option<UrlId> {
        self.index.get(canonical).copied()
    }

    /// Insert `url` unless an equal canonical form is already present.
    /// Returns the surviving entry's id and whether this call inserted it.
    pub fn add_or_return(&mut self, url: Url) -> (UrlId, bool) {
        if let Some(&existing) = self.index.get(&url.url) {
            return (existing, false);
        }
        let id = UrlId(self.urls.len() as u32);
        self.index.insert(url.url.clone(), id);
        self.urls.push(url);
        (id, true)
    }

    /// Like [`add_or_return`](Self::add_or_return), but an existing entry
    /// absorbs the newcomer's flags and gains a reference count instead.
    pub fn add_or_increase(&mut self, url: Url) -> (UrlId, bool) {
        if let Some(&existing) = self.index.get(&url.url) {
            let entry = &mut self.urls[existing.0 as usize];
            entry.flags |= url.flags;
            entry.count += 1;
            return (existing, false);
        }
        let id = UrlId(self.urls.len() as u32);
        self.index.insert(url.url.clone(), id);
        self.urls.push(url);
        (id, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UrlFlags, parse_url};

    #[test]
    fn add_or_return_deduplicates_on_canonical_form() {
        let mut set = UrlSet::new();
        let (a, inserted) = set.add_or_return(parse_url("http://example.com/").unwrap());
        assert!(inserted);
        let (b, inserted) = set.add_or_return(parse_url("http://example.com/").unwrap());
        assert!(!inserted);
        assert_eq!(a, b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn add_or_increase_merges_flags_and_counts() {
        let mut set = UrlSet::new();
        let first = parse_url("http://example.com/").unwrap();
        set.add_or_increase(first);

        let mut second = parse_url("http://example.com/").unwrap();
        second.flags |= UrlFlags::IMAGE;
        let (id, inserted) = set.add_or_increase(second);
        assert!(!inserted);
        assert_eq!(set.get(id).count, 2);
        assert!(set.get(id).flags.contains(UrlFlags::IMAGE));
    }
}
