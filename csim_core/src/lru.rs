//! Least-recently-used replacement.

use crate::cache::CacheLine;

/// Global logical time. Every hit and every insertion takes a fresh value,
/// so valid lines never share a recency.
#[derive(Debug)]
pub struct RecencyClock {
    next: u64,
}

impl RecencyClock {
    pub fn new() -> Self {
        // 0 is reserved for invalid lines
        Self { next: 1 }
    }
    pub fn tick(&mut self) -> u64 {
        let now = self.next;
        self.next += 1;
        now
    }
}

impl Default for RecencyClock {
    fn default() -> Self {
        Self::new()
    }
}

/// recency used for victim selection. an invalid line is as old as possible.
#[inline]
fn effective_recency(line: &CacheLine) -> u64 {
    if line.valid {
        line.recency
    } else {
        0
    }
}

/// Picks the line of `set` to replace: minimum effective recency, lowest
/// index on ties.
pub fn select_victim(set: &[CacheLine]) -> usize {
    // `min_by_key` keeps the first of equal minima
    set.iter()
        .enumerate()
        .min_by_key(|(_, line)| effective_recency(line))
        .map_or(0, |(index, _)| index)
}
