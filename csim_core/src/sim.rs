use crate::{
    addr::{decompose, Addr, Decomposed},
    cache::{Cache, CacheLine},
    common::{AccessOutcome, RecordOutcome, SimulationOption},
    config::{CacheConfig, ConfigError},
    lru::{self, RecencyClock},
    report::{SimulationCounters, SimulationReport},
    trace::{Operation, TraceReader, TraceRecord},
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// Remembers the address of the previous touch.
#[derive(Debug, Default)]
struct LastAddressTracker {
    last: Option<Addr>,
}

impl LastAddressTracker {
    /// records `addr` and tells whether it counts as a repeat.
    fn observe(&mut self, addr: Addr, suppress_repeat: bool) -> bool {
        let repeat = !suppress_repeat && self.last == Some(addr);
        self.last = Some(addr);
        repeat
    }
}

/// Replays a trace against a modeled cache.
///
/// All state of a run lives here: the cache store, the recency clock, the
/// counters, and the last-address tracker. Records are applied strictly in
/// order through [`Simulator::access`].
pub struct Simulator {
    config: CacheConfig,
    cache: Cache,
    clock: RecencyClock,
    counters: SimulationCounters,
    last_addr: LastAddressTracker,
    records: usize,
    truncated: bool,
    #[cfg(feature = "stat")]
    stat_builder: stat::SimStatBuilder,
}

impl Simulator {
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        log::debug!("initializing cache: {config}");
        Ok(Self {
            cache: Cache::new(&config)?,
            config,
            clock: RecencyClock::new(),
            counters: Default::default(),
            last_addr: Default::default(),
            records: 0,
            truncated: false,
            #[cfg(feature = "stat")]
            stat_builder: stat::SimStatBuilder::new(),
        })
    }
    pub fn counters(&self) -> &SimulationCounters {
        &self.counters
    }
    pub fn into_counters(self) -> SimulationCounters {
        self.counters
    }
    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config,
            counters: self.counters,
            records: self.records,
            truncated: self.truncated,
        }
    }

    /// Looks `addr` up and updates the cache. A hit dirties the line no
    /// matter which operation caused it; a freshly installed line is clean.
    pub fn touch(&mut self, addr: Addr, suppress_repeat: bool) -> AccessOutcome {
        let Decomposed { set_index, tag } = decompose(addr, &self.config);
        let mut outcome = match self.cache.lookup(set_index, tag) {
            Some(line_index) => {
                self.hit(set_index, line_index);
                AccessOutcome::Hit
            }
            None => self.miss(set_index, tag),
        };
        if self.last_addr.observe(addr, suppress_repeat) {
            self.counters.repeated_accesses += 1;
            outcome |= AccessOutcome::Repeat;
        }
        outcome
    }

    fn hit(&mut self, set_index: usize, line_index: usize) {
        self.counters.hits += 1;
        let recency = self.clock.tick();
        let line = self.cache.line_mut(set_index, line_index);
        line.recency = recency;
        if !line.dirty {
            line.dirty = true;
            self.counters.active_dirty_bytes += self.config.block_size();
        }
    }

    fn miss(&mut self, set_index: usize, tag: u64) -> AccessOutcome {
        self.counters.misses += 1;
        let mut outcome = AccessOutcome::Miss;
        let block_size = self.config.block_size();
        let victim_index = lru::select_victim(self.cache.set(set_index));
        let recency = self.clock.tick();
        let victim = self.cache.line_mut(set_index, victim_index);
        if victim.valid {
            self.counters.evictions += 1;
            outcome |= AccessOutcome::Eviction;
            if victim.dirty {
                debug_assert!(self.counters.active_dirty_bytes >= block_size);
                self.counters.active_dirty_bytes -= block_size;
                self.counters.evicted_dirty_bytes += block_size;
            }
        }
        *victim = CacheLine {
            valid: true,
            tag,
            dirty: false,
            recency,
        };
        outcome
    }

    /// Applies one trace record. Loads and stores touch once; a modify
    /// touches twice, the first touch never counting as a repeat.
    pub fn access(&mut self, record: &TraceRecord) -> RecordOutcome {
        let mut outcome = RecordOutcome::new();
        match record.op {
            Operation::Load | Operation::Store => outcome.push(self.touch(record.addr, false)),
            Operation::Modify => {
                outcome.push(self.touch(record.addr, true));
                outcome.push(self.touch(record.addr, false));
            }
            Operation::Instruction | Operation::Other(_) => {}
        }
        outcome
    }

    /// Applies `records` in order and returns how many were consumed.
    pub fn run<I>(&mut self, records: I, option: &SimulationOption) -> usize
    where
        I: IntoIterator<Item = TraceRecord>,
    {
        let mut consumed = 0;
        for record in records {
            let outcome = self.access(&record);
            if option.do_trace && !outcome.is_empty() {
                log::info!("{record} {outcome}");
            }
            consumed += 1;
        }
        self.records += consumed;
        #[cfg(feature = "stat")]
        self.stat_builder.stop_timer();
        consumed
    }

    /// Parses `trace` and applies every record up to the end of input or the
    /// first malformed record.
    pub fn run_trace(&mut self, trace: &[u8], option: &SimulationOption) -> usize {
        let mut reader = TraceReader::new(trace);
        let consumed = self.run(reader.by_ref(), option);
        if reader.truncated() {
            log::info!("trace truncated at a malformed record after {consumed} records.");
            self.truncated = true;
        }
        consumed
    }
}

impl Simulator {
    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        let resident = self.cache.lines().filter(|line| line.valid).count();
        buf.push(Box::new(self.stat_builder.finish(
            self.config,
            self.records,
            resident,
            self.truncated,
        )));
        buf.push(Box::new(stat::CacheStat(self.counters)));
        buf.push(Box::new(stat::DirtyStat(self.counters)));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use std::{fmt, time};

    use crate::stat::*;

    use super::*;

    pub struct SimStatBuilder {
        begin: time::Instant,
        elapsed: Option<time::Duration>,
    }

    impl SimStatBuilder {
        pub fn new() -> Self {
            Self {
                begin: time::Instant::now(),
                elapsed: None,
            }
        }
        pub fn stop_timer(&mut self) {
            self.elapsed = Some(time::Instant::now() - self.begin)
        }
        pub fn finish(
            &self,
            config: CacheConfig,
            records: usize,
            resident: usize,
            truncated: bool,
        ) -> SimStat {
            SimStat {
                config,
                records,
                resident,
                truncated,
                elapsed: self.elapsed.unwrap_or_else(|| self.begin.elapsed()),
            }
        }
    }

    impl Default for SimStatBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    pub struct SimStat {
        config: CacheConfig,
        records: usize,
        resident: usize,
        truncated: bool,
        elapsed: time::Duration,
    }

    impl Stat for SimStat {
        fn view(&self) -> Box<dyn StatView + '_> {
            Box::new(SimStatView { stat: self })
        }
    }

    pub struct SimStatView<'a> {
        stat: &'a SimStat,
    }

    impl StatView for SimStatView<'_> {
        fn header(&self) -> &'static str {
            "simulation"
        }
        fn width(&self) -> usize {
            40
        }
    }

    impl fmt::Display for SimStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = self.stat;
            writeln!(f, "      geometry: {}", s.config)?;
            writeln!(f, "       records: {:>10}", s.records)?;
            writeln!(f, "   valid lines: {:>10} / {}", s.resident, s.config.num_lines())?;
            writeln!(f, "     truncated: {:>10}", s.truncated)?;
            write!(f, "  elapsed time: {:>10.6}s", s.elapsed.as_secs_f64())
        }
    }

    pub struct CacheStat(pub SimulationCounters);

    impl Stat for CacheStat {
        fn view(&self) -> Box<dyn StatView + '_> {
            Box::new(CacheStatView { stat: &self.0 })
        }
    }

    pub struct CacheStatView<'a> {
        stat: &'a SimulationCounters,
    }

    impl StatView for CacheStatView<'_> {
        fn header(&self) -> &'static str {
            "cache stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for CacheStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let hit = self.stat.hits;
            let miss = self.stat.misses;
            let total = self.stat.accesses();
            let hit_pct = percentage(hit, total);
            let miss_pct = percentage(miss, total);
            writeln!(f, "      hit: {hit:>10} ({hit_pct:>8}%)")?;
            write!(f, "     miss: {miss:>10} ({miss_pct:>8}%)")
        }
    }

    pub struct DirtyStat(pub SimulationCounters);

    impl Stat for DirtyStat {
        fn view(&self) -> Box<dyn StatView + '_> {
            Box::new(DirtyStatView { stat: &self.0 })
        }
    }

    pub struct DirtyStatView<'a> {
        stat: &'a SimulationCounters,
    }

    impl StatView for DirtyStatView<'_> {
        fn header(&self) -> &'static str {
            "eviction and dirty bytes"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for DirtyStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = self.stat;
            writeln!(f, "        evictions: {:>10}", s.evictions)?;
            writeln!(f, "    dirty evicted: {:>10}", s.evicted_dirty_bytes)?;
            writeln!(f, "   dirty in cache: {:>10}", s.active_dirty_bytes)?;
            write!(f, "  repeated access: {:>10}", s.repeated_accesses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(s: u32, e: usize, b: u32, trace: &str) -> SimulationCounters {
        let mut sim = Simulator::new(CacheConfig::new(s, e, b).unwrap()).unwrap();
        sim.run_trace(trace.as_bytes(), &Default::default());
        sim.into_counters()
    }

    fn counters(values: [u64; 6]) -> SimulationCounters {
        let [hits, misses, evictions, evicted_dirty_bytes, active_dirty_bytes, repeated_accesses] =
            values;
        SimulationCounters {
            hits,
            misses,
            evictions,
            evicted_dirty_bytes,
            active_dirty_bytes,
            repeated_accesses,
        }
    }

    #[test]
    fn test_overflowing_set() {
        let c = simulate(0, 2, 0, "S 0,1\nS 1,1\nS 2,1\nL 0,1\n");
        assert_eq!(c, counters([0, 4, 2, 0, 0, 0]));
    }
    #[test]
    fn test_store_twice() {
        let c = simulate(0, 1, 0, "S 10,1\nS 10,1\n");
        assert_eq!(c, counters([1, 1, 0, 0, 1, 1]));
    }
    #[test]
    fn test_single_modify() {
        let c = simulate(0, 1, 0, "M 20,1\n");
        assert_eq!(c, counters([1, 1, 0, 0, 1, 1]));
    }
    #[test]
    fn test_modify_repeat_independent_of_history() {
        // the preceding load to the same address does not add a second repeat
        let c = simulate(0, 1, 0, "L 20,1\nM 20,1\n");
        assert_eq!(c.repeated_accesses, 1);
        assert_eq!(c.hits, 2);
        assert_eq!(c.misses, 1);
    }
    #[test]
    fn test_load_after_modify_is_repeat() {
        let c = simulate(0, 1, 0, "M 20,1\nL 20,1\n");
        assert_eq!(c.repeated_accesses, 2);
    }
    #[test]
    fn test_repeat_requires_identical_address() {
        // same block, different address
        let c = simulate(2, 1, 4, "L 100,4\nL 104,4\nL 104,4\n");
        assert_eq!(c.hits, 2);
        assert_eq!(c.misses, 1);
        assert_eq!(c.repeated_accesses, 1);
    }
    #[test]
    fn test_first_access_per_set_misses() {
        let config = CacheConfig::new(2, 2, 4).unwrap();
        let mut sim = Simulator::new(config).unwrap();
        for set in 0..4u64 {
            let o = sim.touch(Addr::new(set << 4), false);
            assert!(o.contains(AccessOutcome::Miss));
            assert!(!o.contains(AccessOutcome::Eviction));
        }
        assert_eq!(sim.counters().misses, 4);
    }
    #[test]
    fn test_repeated_address() {
        for n in 1..10u64 {
            let mut sim = Simulator::new(CacheConfig::new(1, 1, 2).unwrap()).unwrap();
            for _ in 0..n {
                sim.touch(Addr::new(0x40), false);
            }
            let c = sim.counters();
            assert_eq!(c.misses, 1);
            assert_eq!(c.hits, n - 1);
            assert_eq!(c.evictions, 0);
            assert_eq!(c.repeated_accesses, n - 1);
        }
    }
    #[test]
    fn test_load_dirties_on_hit() {
        let c = simulate(0, 1, 3, "L 0,8\nL 0,8\nL 0,8\n");
        // the line turns dirty once, on the first hit
        assert_eq!(c.active_dirty_bytes, 8);
        assert_eq!(c.hits, 2);
    }
    #[test]
    fn test_dirty_eviction_moves_bytes() {
        let c = simulate(0, 1, 2, "L 0,1\nL 0,1\nL 10,1\n");
        assert_eq!(c.evictions, 1);
        assert_eq!(c.evicted_dirty_bytes, 4);
        assert_eq!(c.active_dirty_bytes, 0);
    }
    #[test]
    fn test_clean_eviction() {
        let c = simulate(0, 1, 2, "L 0,1\nL 10,1\n");
        assert_eq!(c.evictions, 1);
        assert_eq!(c.evicted_dirty_bytes, 0);
    }
    #[test]
    fn test_lru_order_follows_hits() {
        let config = CacheConfig::new(0, 2, 0).unwrap();
        let mut sim = Simulator::new(config).unwrap();
        sim.touch(Addr::new(1), false);
        sim.touch(Addr::new(2), false);
        // refresh 1, so 2 is now least recently used
        assert!(sim.touch(Addr::new(1), false).contains(AccessOutcome::Hit));
        let o = sim.touch(Addr::new(3), false);
        assert!(o.contains(AccessOutcome::Miss | AccessOutcome::Eviction));
        assert!(sim.touch(Addr::new(1), false).contains(AccessOutcome::Hit));
        assert!(sim.touch(Addr::new(2), false).contains(AccessOutcome::Miss));
    }
    #[test]
    fn test_invalid_lines_fill_lowest_index_first() {
        let mut sim = Simulator::new(CacheConfig::new(0, 4, 0).unwrap()).unwrap();
        sim.touch(Addr::new(7), false);
        sim.touch(Addr::new(8), false);
        let set = sim.cache.set(0);
        assert_eq!((set[0].valid, set[0].tag), (true, 7));
        assert_eq!((set[1].valid, set[1].tag), (true, 8));
        assert!(!set[2].valid && !set[3].valid);
    }
    #[test]
    fn test_sets_are_independent() {
        // two sets of one line, block size 1: even and odd addresses
        let c = simulate(1, 1, 0, "L 0,1\nL 1,1\nL 0,1\nL 1,1\n");
        assert_eq!(c.misses, 2);
        assert_eq!(c.hits, 2);
        assert_eq!(c.evictions, 0);
    }
    #[test]
    fn test_active_dirty_matches_resident_lines() {
        let config = CacheConfig::new(1, 2, 3).unwrap();
        let mut sim = Simulator::new(config).unwrap();
        let trace = "L 0,1\nS 0,1\nM 8,1\nL 10,1\nS 18,1\nL 20,1\nM 28,1\nS 0,1\nL 30,1\n";
        sim.run_trace(trace.as_bytes(), &Default::default());
        let dirty_lines = sim.cache.lines().filter(|l| l.valid && l.dirty).count() as u64;
        let c = sim.counters();
        assert_eq!(c.active_dirty_bytes, dirty_lines * config.block_size());
        assert_eq!(c.evicted_dirty_bytes % config.block_size(), 0);
    }
    #[test]
    fn test_instruction_records_ignored() {
        let c = simulate(0, 1, 0, "I 10,4\nL 10,1\nI 10,4\nL 10,1\nX 10,1\n");
        assert_eq!(c, counters([1, 1, 0, 0, 1, 1]));
    }
    #[test]
    fn test_truncated_trace_reports_partial() {
        let mut sim = Simulator::new(CacheConfig::new(0, 1, 0).unwrap()).unwrap();
        let consumed = sim.run_trace(b"S 10,1\nS 10,1\nbroken\nS 10,1\n", &Default::default());
        assert_eq!(consumed, 2);
        let report = sim.report();
        assert!(report.truncated);
        assert_eq!(report.records, 2);
        assert_eq!(report.counters, counters([1, 1, 0, 0, 1, 1]));
    }
    #[test]
    fn test_record_outcome() {
        let mut sim = Simulator::new(CacheConfig::new(0, 1, 0).unwrap()).unwrap();
        let record = crate::trace::parse_record(b"M 20,1").unwrap().1;
        assert_eq!(sim.access(&record).to_string(), "miss hit repeat");
        let record = crate::trace::parse_record(b"I 20,1").unwrap().1;
        assert!(sim.access(&record).is_empty());
    }
    #[test]
    fn test_tracker() {
        let mut t = LastAddressTracker::default();
        assert!(!t.observe(Addr::new(0), false));
        assert!(t.observe(Addr::new(0), false));
        assert!(!t.observe(Addr::new(0), true));
        assert!(!t.observe(Addr::new(1), false));
    }
    #[cfg(feature = "stat")]
    #[test]
    fn test_collect_stat() {
        let mut sim = Simulator::new(CacheConfig::new(0, 1, 0).unwrap()).unwrap();
        sim.run_trace(b"S 10,1\nS 10,1\n", &Default::default());
        let s = sim.collect_stat().view().to_string();
        assert!(s.contains("valid lines:          1 / 1"));
        assert!(s.contains("hit:          1 (50.000000%)"));
        assert!(s.contains("dirty in cache:          1"));
    }
}
