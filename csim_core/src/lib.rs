//! Trace-driven simulation of a set-associative cache with LRU replacement.

pub mod addr;
pub mod cache;
pub mod common;
pub mod config;
pub mod lru;
pub mod report;
pub mod sim;
pub mod trace;

#[cfg(feature = "stat")]
pub mod stat;
