//! `Links` — insertion-ordered set of connection back-references.

/// Insertion-ordered collection of unique keys.
///
/// Both sides of a connection keep one of these: a signal lists its slots,
/// a slot lists its signals. Delivery order follows insertion order.
/// Connection counts are small, so a linear scan beats a second index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links<K> {
    entries: Vec<K>,
}

impl<K: Copy + Eq> Links<K> {
    pub fn new() -> Self {
        Links {
            entries: Vec::new(),
        }
    }

    /// Append `key` unless present. Returns `true` if it was added.
    pub fn insert(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.entries.push(key);
        true
    }

    /// Remove `key`, preserving the order of the rest.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.entries.iter().position(|k| k == key) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// The oldest surviving connection.
    pub fn first(&self) -> Option<K> {
        self.entries.first().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().copied()
    }

    /// Owned copy for iteration that may mutate the original.
    pub fn snapshot(&self) -> Vec<K> {
        self.entries.clone()
    }
}

impl<K: Copy + Eq> Default for Links<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> IntoIterator for Links<K> {
    type Item = K;
    type IntoIter = std::vec::IntoIter<K>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_unique_and_ordered() {
        let mut links = Links::new();
        assert!(links.insert(3));
        assert!(links.insert(1));
        assert!(!links.insert(3));
        assert!(links.insert(2));
        assert_eq!(links.snapshot(), vec![3, 1, 2]);
        assert_eq!(links.first(), Some(3));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut links = Links::new();
        for k in [5, 6, 7, 8] {
            links.insert(k);
        }
        assert!(links.remove(&6));
        assert!(!links.remove(&6));
        assert_eq!(links.iter().collect::<Vec<_>>(), vec![5, 7, 8]);
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn test_empty() {
        let links: Links<u8> = Links::default();
        assert!(links.is_empty());
        assert_eq!(links.first(), None);
    }
}
