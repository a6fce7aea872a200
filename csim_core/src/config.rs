use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// width of a simulated address
pub const ADDR_BITS: u32 = u64::BITS;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("associativity must be at least 1")]
    ZeroAssociativity,
    #[error("set index bits ({set_index_bits}) and block offset bits ({block_offset_bits}) exceed the 64-bit address")]
    AddressTooNarrow {
        set_index_bits: u32,
        block_offset_bits: u32,
    },
    #[error("block offset bits ({0}) too large for a representable block size")]
    BlockTooLarge(u32),
    #[error("2^{set_index_bits} sets of {associativity} lines do not fit in memory")]
    TooManyLines {
        set_index_bits: u32,
        associativity: usize,
    },
    #[error("failed to allocate {num_lines} cache lines")]
    OutOfMemory { num_lines: usize },
}

/// Cache geometry. Validated once by [`CacheConfig::new`] and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    set_index_bits: u32,
    associativity: usize,
    block_offset_bits: u32,
}

impl CacheConfig {
    pub fn new(
        set_index_bits: u32,
        associativity: usize,
        block_offset_bits: u32,
    ) -> Result<Self, ConfigError> {
        if associativity == 0 {
            return Err(ConfigError::ZeroAssociativity);
        }
        if set_index_bits
            .checked_add(block_offset_bits)
            .map_or(true, |bits| bits > ADDR_BITS)
        {
            return Err(ConfigError::AddressTooNarrow {
                set_index_bits,
                block_offset_bits,
            });
        }
        if block_offset_bits >= ADDR_BITS {
            return Err(ConfigError::BlockTooLarge(block_offset_bits));
        }
        let num_lines = 1usize
            .checked_shl(set_index_bits)
            .and_then(|num_sets| num_sets.checked_mul(associativity));
        if num_lines.is_none() {
            return Err(ConfigError::TooManyLines {
                set_index_bits,
                associativity,
            });
        }
        Ok(Self {
            set_index_bits,
            associativity,
            block_offset_bits,
        })
    }
    pub fn set_index_bits(&self) -> u32 {
        self.set_index_bits
    }
    pub fn associativity(&self) -> usize {
        self.associativity
    }
    pub fn block_offset_bits(&self) -> u32 {
        self.block_offset_bits
    }
    /// `2^S`
    pub fn num_sets(&self) -> usize {
        1 << self.set_index_bits
    }
    /// `2^B`, in bytes
    pub fn block_size(&self) -> u64 {
        1 << self.block_offset_bits
    }
    /// total number of lines in the cache
    pub fn num_lines(&self) -> usize {
        self.num_sets() * self.associativity
    }
}

impl fmt::Display for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "s={}, E={}, b={} ({} sets, {}-byte blocks)",
            self.set_index_bits,
            self.associativity,
            self.block_offset_bits,
            self.num_sets(),
            self.block_size()
        )
    }
}
