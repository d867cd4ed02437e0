// MITTCFQ TUNING TYPES
// PURE-RUST MODULE: SHARED BETWEEN THE BINARY (cli/) AND THE LIB (tests)
//
// ALL LATENCIES ARE NANOSECONDS. POSITIONS AND LENGTHS ARE 512-BYTE SECTORS.

use anyhow::{bail, Result};

// HISTORY WINDOW

pub const HISTORY_CAPACITY: usize = 10_000;

// SLA DEFAULTS
// 20MS FOREGROUND TARGET, 1% SLOW QUOTA OVER THE DEFAULT WINDOW (P99)

pub const DEFAULT_LATENCY_THRESHOLD_NS: u64 = 20_000_000;
pub const DEFAULT_SLOWCOUNT_THRESHOLD: usize = 100;

// ESTIMATOR SCAN BOUNDS
// GROUP TIER: 100 QUEUES x 100 REQUESTS. LINEAR TIERS GET THE SAME WORST CASE.

pub const DEFAULT_GROUP_QUEUES: usize = 100;
pub const DEFAULT_REQUESTS_PER_QUEUE: usize = 100;
pub const DEFAULT_LINEAR_TIER_REQUESTS: usize = DEFAULT_GROUP_QUEUES * DEFAULT_REQUESTS_PER_QUEUE;

// REFERENCE COST MODEL: FLAT 60US PER REQUEST, POSITION IGNORED

pub const REQ_LAT_NS: u64 = 60_000;

pub const SECTOR_SIZE: u64 = 512;

// SLA PARAMETERS
// VALIDATED ONCE AT CONFIGURATION TIME. HISTORY NEVER FAILS AFTER THAT.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlaParams {
    pub latency_threshold_ns: u64,
    pub slowcount_threshold: usize,
    pub capacity: usize,
}

impl Default for SlaParams {
    fn default() -> Self {
        Self {
            latency_threshold_ns: DEFAULT_LATENCY_THRESHOLD_NS,
            slowcount_threshold: DEFAULT_SLOWCOUNT_THRESHOLD,
            capacity: HISTORY_CAPACITY,
        }
    }
}

impl SlaParams {
    pub fn new(latency_threshold_ns: u64, slowcount_threshold: usize, capacity: usize) -> Result<Self> {
        let params = Self {
            latency_threshold_ns,
            slowcount_threshold,
            capacity,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            bail!("HISTORY CAPACITY MUST BE POSITIVE");
        }
        Ok(())
    }

    // FRACTION OF THE WINDOW ALLOWED TO BE SLOW (E.G. 0.01 FOR P99)
    pub fn slow_quota(&self) -> f64 {
        self.slowcount_threshold as f64 / self.capacity as f64
    }
}
