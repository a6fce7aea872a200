use crate::config::{CacheConfig, ConfigError};

/// Metadata of one cache line. Block contents are never modeled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheLine {
    pub valid: bool,
    pub tag: u64,
    pub dirty: bool,
    /// value of the recency clock at the last hit or insertion
    pub recency: u64,
}

/// `num_sets` sets of `associativity` lines, stored contiguously.
/// line `i` of set `s` lives at `s * associativity + i`.
pub struct Cache {
    lines: Vec<CacheLine>,
    associativity: usize,
}

impl Cache {
    /// allocates every line up front. a geometry too large for the host is
    /// reported instead of aborting.
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigError> {
        let num_lines = config.num_lines();
        let mut lines = Vec::new();
        lines
            .try_reserve_exact(num_lines)
            .map_err(|_| ConfigError::OutOfMemory { num_lines })?;
        lines.resize(num_lines, CacheLine::default());
        Ok(Self {
            lines,
            associativity: config.associativity(),
        })
    }
    fn set_range(&self, set_index: usize) -> std::ops::Range<usize> {
        let begin = set_index * self.associativity;
        begin..begin + self.associativity
    }
    pub fn set(&self, set_index: usize) -> &[CacheLine] {
        &self.lines[self.set_range(set_index)]
    }
    pub fn set_mut(&mut self, set_index: usize) -> &mut [CacheLine] {
        let range = self.set_range(set_index);
        &mut self.lines[range]
    }
    pub fn line_mut(&mut self, set_index: usize, line_index: usize) -> &mut CacheLine {
        &mut self.set_mut(set_index)[line_index]
    }
    /// index of the valid line in `set_index` holding `tag`, if any.
    pub fn lookup(&self, set_index: usize, tag: u64) -> Option<usize> {
        self.set(set_index)
            .iter()
            .position(|line| line.valid && line.tag == tag)
    }
    pub fn lines(&self) -> impl Iterator<Item = &CacheLine> {
        self.lines.iter()
    }
}
