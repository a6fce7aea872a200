use std::fmt;

use anyhow::Result;
use serde::Serialize;

use crate::config::CacheConfig;

/// Aggregate result of a simulation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// bytes of dirty lines pushed out of the cache
    pub evicted_dirty_bytes: u64,
    /// bytes of dirty lines still resident
    pub active_dirty_bytes: u64,
    /// touches of the address touched immediately before
    pub repeated_accesses: u64,
}

impl SimulationCounters {
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for SimulationCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits:{} misses:{} evictions:{} dirty_bytes_evicted:{} dirty_bytes_in_cache:{} repeated_accesses:{}",
            self.hits,
            self.misses,
            self.evictions,
            self.evicted_dirty_bytes,
            self.active_dirty_bytes,
            self.repeated_accesses
        )
    }
}

/// Everything worth persisting about a finished run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub config: CacheConfig,
    pub counters: SimulationCounters,
    /// trace records consumed
    pub records: usize,
    /// whether the trace ended at a malformed record
    pub truncated: bool,
}

impl SimulationReport {
    pub fn ser(&self, file: impl std::io::Write) -> Result<()> {
        Ok(serde_json::to_writer_pretty(file, self)?)
    }
}
