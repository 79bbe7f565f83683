use std::{collections::HashMap, hash::Hash};

/// Value tally that remembers first-seen order, so ties resolve to the value
/// encountered first in input order.
#[derive(Debug, Clone)]
pub struct FrequencyCounter<K> {
    order: Vec<K>,
    counts: HashMap<K, usize>,
    total: usize,
}

impl<K> Default for FrequencyCounter<K> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            counts: HashMap::new(),
            total: 0,
        }
    }
}

impl<K> FrequencyCounter<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K) {
        self.total += 1;
        match self.counts.get_mut(&key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.clone());
                self.counts.insert(key, 1);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn distinct(&self) -> usize {
        self.order.len()
    }

    pub fn count(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn most_frequent(&self) -> Option<(&K, usize)> {
        let mut best: Option<(&K, usize)> = None;
        for key in &self.order {
            let count = self.count(key);
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((key, count));
            }
        }
        best
    }

    /// Up to `limit` entries by descending count, first-seen order on ties.
    pub fn top(&self, limit: usize) -> Vec<(&K, usize)> {
        let mut items = self
            .order
            .iter()
            .map(|key| (key, self.count(key)))
            .collect::<Vec<_>>();
        // Stable sort keeps first-seen order among equal counts.
        items.sort_by(|a, b| b.1.cmp(&a.1));
        items.truncate(limit);
        items
    }
}

impl<K> FromIterator<K> for FrequencyCounter<K>
where
    K: Eq + Hash + Clone,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut counter = FrequencyCounter::new();
        for key in iter {
            counter.add(key);
        }
        counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_resolve_to_first_encountered() {
        let counter = ["b", "a", "a", "b", "c"].into_iter().collect::<FrequencyCounter<_>>();
        assert_eq!(counter.most_frequent(), Some((&"b", 2)));
        assert_eq!(counter.distinct(), 3);
        assert_eq!(counter.total(), 5);
    }

    #[test]
    fn top_orders_by_count_then_first_seen() {
        let counter = ["x", "y", "z", "z", "y"].into_iter().collect::<FrequencyCounter<_>>();
        let top = counter.top(2);
        assert_eq!(top, vec![(&"y", 2), (&"z", 2)]);
    }

    #[test]
    fn empty_counter_has_no_mode() {
        let counter = FrequencyCounter::<String>::new();
        assert!(counter.most_frequent().is_none());
        assert_eq!(counter.distinct(), 0);
    }
}
