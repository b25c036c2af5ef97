use std::collections::{HashMap, VecDeque};

use riskcheck_core::{compute, Feature, RiskInput, RiskReport};

/// Bit patterns of the clamped input. Equal keys always produce equal reports,
/// so a hit can never be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey([u64; 8]);

impl MemoKey {
    fn of(input: &RiskInput) -> Self {
        let clamped = input.clamped();
        // + 0.0 folds -0.0 onto 0.0
        Self(Feature::ALL.map(|feature| (clamped.get(feature) + 0.0).to_bits()))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

/// Bounded read-through LRU in front of `compute`.
#[derive(Debug)]
pub struct ReportCache {
    entries: HashMap<MemoKey, RiskReport>,
    lru: VecDeque<MemoKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ReportCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn get_or_compute(&mut self, input: RiskInput) -> RiskReport {
        if !self.is_enabled() {
            return compute(input);
        }

        let key = MemoKey::of(&input);
        if let Some(report) = self.entries.get(&key).cloned() {
            self.bump_lru(key);
            self.hits = self.hits.saturating_add(1);
            return report;
        }

        self.misses = self.misses.saturating_add(1);
        let report = compute(input);
        self.entries.insert(key, report.clone());
        self.bump_lru(key);
        while self.entries.len() > self.capacity {
            let Some(old) = self.lru.pop_front() else {
                break;
            };
            if self.entries.remove(&old).is_some() {
                self.evictions = self.evictions.saturating_add(1);
            }
        }
        report
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.entries.len(),
            capacity: self.capacity,
        }
    }

    fn bump_lru(&mut self, key: MemoKey) {
        self.lru.retain(|k| *k != key);
        self.lru.push_back(key);
    }
}
