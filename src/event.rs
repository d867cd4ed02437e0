// MITTCFQ EVENT LOG
// RECORDS GATE SNAPSHOTS WHILE THE PROBE RUNS
// FIXED RING, ALLOCATED ONCE AT STARTUP. THE PROBE LOOP NEVER ALLOCATES.
// AT CAPACITY THE OLDEST SNAPSHOT IS REPLACED.

use crate::timestamp::now_ns;

const MAX_SNAPSHOTS: usize = 8192;

#[derive(Clone, Copy, Default)]
pub struct Snapshot {
    pub ts_ns:        u64,
    pub completions:  u64,
    pub avg_lat_ns:   u64,
    pub slow_count:   u64,
    pub admitted:     u64,
    pub rejected:     u64,
    pub estimate_ns:  u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LogTotals {
    pub completions:      u64,
    pub admitted:         u64,
    pub rejected:         u64,
    pub peak_slow:        u64,
    pub peak_avg_lat_ns:  u64,
    pub peak_estimate_ns: u64,
}

impl LogTotals {
    pub fn admit_pct(&self) -> Option<f64> {
        let decisions = self.admitted + self.rejected;
        (decisions > 0).then(|| self.admitted as f64 / decisions as f64 * 100.0)
    }
}

pub struct EventLog {
    snapshots: Vec<Snapshot>,
    head:      usize,
    len:       usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            snapshots: vec![Snapshot::default(); MAX_SNAPSHOTS],
            head: 0,
            len: 0,
        }
    }

    // RECORD ONE SNAPSHOT. CALLED ONCE PER SECOND FROM THE PROBE LOOP.
    // OVERWRITES OLDEST ENTRY WHEN FULL.
    pub fn snapshot(&mut self, completions: u64, avg_lat_ns: u64, slow_count: u64,
                    admitted: u64, rejected: u64, estimate_ns: u64) {
        self.snapshots[self.head] = Snapshot {
            ts_ns: now_ns(),
            completions,
            avg_lat_ns,
            slow_count,
            admitted,
            rejected,
            estimate_ns,
        };
        self.head = (self.head + 1) % MAX_SNAPSHOTS;
        if self.len < MAX_SNAPSHOTS {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // OLDEST FIRST. BEFORE THE FIRST WRAP THE LIVE PREFIX IS ALREADY IN ORDER.
    pub fn iter_chronological(&self) -> impl Iterator<Item = &Snapshot> {
        let (older, newer) = if self.len < MAX_SNAPSHOTS {
            (&self.snapshots[..self.len], &self.snapshots[..0])
        } else {
            (&self.snapshots[self.head..], &self.snapshots[..self.head])
        };
        older.iter().chain(newer.iter())
    }

    // DUMP THE TIME SERIES AFTER EXECUTION
    pub fn dump(&self) {
        let Some(base_ts) = self.iter_chronological().next().map(|s| s.ts_ns) else {
            return;
        };

        println!("\n{:<10} {:<10} {:<12} {:<8} {:<10} {:<10} {:<12}",
            "TIME_S", "DONE/S", "AVG_LAT_US", "SLOW", "ADMIT/S", "REJECT/S", "EST_US");
        println!("{}", "-".repeat(78));

        for s in self.iter_chronological() {
            let elapsed_s = s.ts_ns.saturating_sub(base_ts) as f64 / 1_000_000_000.0;
            println!("{:<10.1} {:<10} {:<12} {:<8} {:<10} {:<10} {:<12}",
                elapsed_s, s.completions, s.avg_lat_ns / 1000, s.slow_count,
                s.admitted, s.rejected, s.estimate_ns / 1000);
        }

        if self.len == MAX_SNAPSHOTS {
            println!("\n(RING BUFFER WRAPPED -- SHOWING MOST RECENT {} SNAPSHOTS)", MAX_SNAPSHOTS);
        }
        println!("TOTAL SNAPSHOTS: {}", self.len);
    }

    pub fn totals(&self) -> LogTotals {
        self.iter_chronological().fold(LogTotals::default(), |mut t, s| {
            t.completions += s.completions;
            t.admitted += s.admitted;
            t.rejected += s.rejected;
            t.peak_slow = t.peak_slow.max(s.slow_count);
            t.peak_avg_lat_ns = t.peak_avg_lat_ns.max(s.avg_lat_ns);
            t.peak_estimate_ns = t.peak_estimate_ns.max(s.estimate_ns);
            t
        })
    }

    fn span_ns(&self) -> u64 {
        let mut iter = self.iter_chronological();
        match (iter.next(), iter.last()) {
            (Some(first), Some(last)) => last.ts_ns.saturating_sub(first.ts_ns),
            _ => 0,
        }
    }

    pub fn summary(&self) {
        if self.len < 2 {
            return;
        }
        let t = self.totals();
        let elapsed_s = self.span_ns() as f64 / 1_000_000_000.0;

        println!("\n{}", "=".repeat(50));
        println!("MITTCFQ SUMMARY");
        println!("{}", "=".repeat(50));
        println!("  TOTAL COMPLETIONS: {}", t.completions);
        println!("  PEAK SLOW COUNT:   {}", t.peak_slow);
        println!("  PEAK AVG LATENCY:  {}us", t.peak_avg_lat_ns / 1000);
        println!("  PEAK ESTIMATE:     {}us", t.peak_estimate_ns / 1000);
        if elapsed_s > 0.0 {
            println!("  AVG COMPLETIONS/S: {:.0}", t.completions as f64 / elapsed_s);
        }
        if let Some(pct) = t.admit_pct() {
            println!("  ADMIT RATE:        {:.1}%", pct);
        }
        println!("  ELAPSED:           {:.1}s", elapsed_s);
        println!("  SAMPLES:           {}", self.len);
    }
}
