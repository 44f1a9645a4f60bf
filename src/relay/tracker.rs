//! Bounded redelivery counter.

use std::collections::{HashMap, VecDeque};

/// Counts deliveries per correlation token.
///
/// Holds at most `capacity` tokens; when full, the token first seen longest
/// ago is forgotten. Counts live only in process memory.
#[derive(Debug)]
pub struct RedeliveryTracker {
    counts: HashMap<String, Entry>,
    order: VecDeque<(u64, String)>,
    capacity: usize,
    next_seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    seq: u64,
}

impl RedeliveryTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            counts: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Record one delivery of `token` and return how many have been seen.
    pub fn record(&mut self, token: &str) -> u32 {
        if let Some(entry) = self.counts.get_mut(token) {
            entry.count = entry.count.saturating_add(1);
            return entry.count;
        }

        while self.counts.len() >= self.capacity {
            self.evict_oldest();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.counts.insert(token.to_string(), Entry { count: 1, seq });
        self.order.push_back((seq, token.to_string()));
        self.compact();

        1
    }

    /// Forget `token`.
    pub fn clear(&mut self, token: &str) {
        self.counts.remove(token);
    }

    /// Deliveries seen for `token`, zero when untracked.
    pub fn count(&self, token: &str) -> u32 {
        self.counts.get(token).map(|entry| entry.count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn evict_oldest(&mut self) {
        while let Some((seq, token)) = self.order.pop_front() {
            // Skip tokens cleared or re-inserted since this slot was queued.
            if self.counts.get(&token).is_some_and(|entry| entry.seq == seq) {
                self.counts.remove(&token);
                return;
            }
        }
    }

    // Cleared tokens leave stale slots in `order`; drop them once they
    // outnumber live ones.
    fn compact(&mut self) {
        if self.order.len() > self.capacity.saturating_mul(2) {
            let counts = &self.counts;
            self.order
                .retain(|(seq, token)| counts.get(token).is_some_and(|entry| entry.seq == *seq));
        }
    }
}
