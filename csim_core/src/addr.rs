use std::fmt;

use crate::config::CacheConfig;

/// Raw simulated address, displayed the way trace files spell it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(u64);

impl Addr {
    pub fn new(v: u64) -> Self {
        Self(v)
    }
    pub fn inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// mask of the lowest `bits` bits; saturates at the full address width.
/// ```
/// use csim_core::addr::mask_lower;
///
/// assert_eq!(mask_lower(0), 0);
/// assert_eq!(mask_lower(4), 0b1111);
/// assert_eq!(mask_lower(64), u64::MAX);
/// ```
#[inline]
pub const fn mask_lower(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// logical right shift that yields 0 instead of overflowing.
#[inline]
pub const fn shr(v: u64, amount: u32) -> u64 {
    if amount >= u64::BITS {
        0
    } else {
        v >> amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposed {
    pub set_index: usize,
    pub tag: u64,
}

/// splits `addr` into its set index and tag. block offset bits are dropped.
pub fn decompose(addr: Addr, config: &CacheConfig) -> Decomposed {
    let s = config.set_index_bits();
    let b = config.block_offset_bits();
    let set_index = shr(addr.inner(), b) & mask_lower(s);
    Decomposed {
        // bounded by num_sets, which fits in usize
        set_index: set_index as usize,
        tag: shr(addr.inner(), s + b),
    }
}
