//! Ordered, URL-keyed accumulator for catalog enumeration

use std::collections::HashSet;

use crate::crawler::CatalogItem;

/// Insertion-ordered map of catalog items keyed by URL
///
/// The first item seen for a URL wins; later items with the same URL are
/// ignored, never merged.
#[derive(Debug, Clone, Default)]
pub struct CatalogMap {
    items: Vec<CatalogItem>,
    seen: HashSet<String>,
}

impl CatalogMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, returning `true` if its URL was not present yet
    pub fn insert(&mut self, item: CatalogItem) -> bool {
        if self.seen.contains(&item.url) {
            return false;
        }
        self.seen.insert(item.url.clone());
        self.items.push(item);
        true
    }

    /// Insert every item and return how many were new
    pub fn merge<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = CatalogItem>,
    {
        let mut added = 0;
        for item in items {
            if self.insert(item) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn get(&self, url: &str) -> Option<&CatalogItem> {
        if !self.contains(url) {
            return None;
        }
        self.items.iter().find(|item| item.url == url)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.iter()
    }

    /// Consume the map, yielding items in first-seen order
    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items
    }
}

impl FromIterator<CatalogItem> for CatalogMap {
    fn from_iter<T: IntoIterator<Item = CatalogItem>>(iter: T) -> Self {
        let mut map = CatalogMap::new();
        map.merge(iter);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(urls: &[(&str, bool)]) -> Vec<CatalogItem> {
        urls.iter()
            .map(|(url, adaptive)| CatalogItem::new(*url, *adaptive))
            .collect()
    }

    #[test]
    fn test_first_seen_wins() {
        let mut map = CatalogMap::new();

        assert!(map.insert(CatalogItem::new("https://x/view/a/", true)));
        assert!(!map.insert(CatalogItem::new("https://x/view/a/", false)));

        assert_eq!(map.len(), 1);
        assert!(map.get("https://x/view/a/").unwrap().adaptive_support);
    }

    #[test]
    fn test_reenumerating_a_captured_page_adds_nothing() {
        let first = page(&[("a", false), ("b", true), ("c", false)]);
        let second = page(&[("d", false), ("e", true)]);

        let mut forward = CatalogMap::new();
        assert_eq!(forward.merge(first.clone()), 3);
        assert_eq!(forward.merge(second.clone()), 2);
        assert_eq!(forward.merge(first.clone()), 0);
        assert_eq!(forward.merge(second.clone()), 0);

        let mut reverse = CatalogMap::new();
        assert_eq!(reverse.merge(second.clone()), 2);
        assert_eq!(reverse.merge(first.clone()), 3);
        assert_eq!(reverse.merge(second), 0);
        assert_eq!(reverse.merge(first), 0);

        assert_eq!(forward.len(), reverse.len());
    }

    #[test]
    fn test_duplicates_within_one_page() {
        let map: CatalogMap = page(&[("a", true), ("a", false), ("b", false)])
            .into_iter()
            .collect();

        let items = map.into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], CatalogItem::new("a", true));
        assert_eq!(items[1].url, "b");
    }
}
