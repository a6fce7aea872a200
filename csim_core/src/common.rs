use std::fmt;

use bitmask_enum::bitmask;

/// What a single touch of the cache did.
#[bitmask(u8)]
pub enum AccessOutcome {
    Hit,
    Miss,
    Eviction,
    Repeat,
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = [
            (Self::Hit, "hit"),
            (Self::Miss, "miss"),
            (Self::Eviction, "eviction"),
            (Self::Repeat, "repeat"),
        ];
        let mut sep = "";
        for (flag, word) in words {
            if self.contains(flag) {
                write!(f, "{sep}{word}")?;
                sep = " ";
            }
        }
        Ok(())
    }
}

/// Outcomes of every touch one trace record caused, in order.
/// a modify record touches twice, other data records once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    touches: [AccessOutcome; 2],
    len: usize,
}

impl RecordOutcome {
    pub fn new() -> Self {
        Self {
            touches: [AccessOutcome::none(); 2],
            len: 0,
        }
    }
    pub(crate) fn push(&mut self, outcome: AccessOutcome) {
        debug_assert!(self.len < self.touches.len(), "a record touches at most twice");
        self.touches[self.len] = outcome;
        self.len += 1;
    }
    pub fn touches(&self) -> &[AccessOutcome] {
        &self.touches[..self.len]
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for RecordOutcome {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for t in self.touches() {
            write!(f, "{sep}{t}")?;
            sep = " ";
        }
        Ok(())
    }
}

/// Knobs of [`crate::sim::Simulator::run`].
#[derive(Default)]
pub struct SimulationOption {
    /// log every data record with its outcome
    pub do_trace: bool,
}
