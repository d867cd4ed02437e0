// MITTCFQ LATENCY HISTORY
// FIXED-CAPACITY RING OF COMPLETION LATENCIES WITH A RUNNING SLOW COUNT.
//
// INVARIANT: slow_count == NUMBER OF VALID ENTRIES WITH VALUE > latency_threshold.
// ACCEPT AND CAN_ACCEPT ARE O(1), ALLOCATION-FREE AFTER CONSTRUCTION.
// ZERO-FILLED SLOTS ARE ALWAYS FAST: 0 <= ANY u64 THRESHOLD.

use anyhow::Result;

use crate::tuning::SlaParams;

pub struct History {
    latencies: Vec<u64>,
    index: usize,
    count: usize,
    latency_threshold: u64,
    slowcount_threshold: usize,
    slow_count: usize,
}

impl History {
    pub fn new(params: SlaParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            latencies: vec![0; params.capacity],
            index: 0,
            count: 0,
            latency_threshold: params.latency_threshold_ns,
            slowcount_threshold: params.slowcount_threshold,
            slow_count: 0,
        })
    }

    pub fn with_capacity(
        capacity: usize,
        latency_threshold: u64,
        slowcount_threshold: usize,
    ) -> Result<Self> {
        Self::new(SlaParams::new(latency_threshold, slowcount_threshold, capacity)?)
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.count = 0;
        self.slow_count = 0;
        self.latencies.fill(0);
    }

    // THRESHOLDS CHANGED => OLD CLASSIFICATIONS ARE MEANINGLESS. DISCARD THE WINDOW.
    pub fn set_parameter(&mut self, latency_threshold: u64, slowcount_threshold: usize) {
        self.latency_threshold = latency_threshold;
        self.slowcount_threshold = slowcount_threshold;
        self.reset();
    }

    #[inline]
    pub fn is_slow(&self, value: u64) -> bool {
        value > self.latency_threshold
    }

    // THE SAMPLE THE NEXT accept() WILL EVICT
    #[inline]
    pub fn cur_value(&self) -> u64 {
        self.latencies[self.index]
    }

    // PREDICTIVE GATE. DOES NOT WRITE THE CANDIDATE.
    // AT THE THRESHOLD ONLY THE OUTGOING SAMPLE IS INSPECTED: EVICTING A SLOW
    // SAMPLE KEEPS slow_count <= THRESHOLD WHATEVER THE NEXT VALUE TURNS OUT TO BE.
    pub fn can_accept(&self, _candidate: u64) -> bool {
        if self.count < self.latencies.len() {
            return true;
        }
        if self.slow_count < self.slowcount_threshold {
            true
        } else if self.slow_count == self.slowcount_threshold {
            self.is_slow(self.cur_value())
        } else {
            false
        }
    }

    pub fn accept(&mut self, value: u64) {
        let capacity = self.latencies.len();
        let prev_value = std::mem::replace(&mut self.latencies[self.index], value);
        self.index = (self.index + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }

        match (self.is_slow(value), self.is_slow(prev_value)) {
            (false, true) => self.slow_count -= 1,
            (true, false) => self.slow_count += 1,
            _ => {}
        }
    }

    pub fn capacity(&self) -> usize {
        self.latencies.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.latencies.len()
    }

    pub fn slow_count(&self) -> usize {
        self.slow_count
    }

    pub fn latency_threshold(&self) -> u64 {
        self.latency_threshold
    }

    pub fn slowcount_threshold(&self) -> usize {
        self.slowcount_threshold
    }

    // HEADROOM BEFORE THE QUOTA IS REACHED. ZERO AT OR ABOVE THRESHOLD.
    pub fn slow_budget(&self) -> usize {
        self.slowcount_threshold.saturating_sub(self.slow_count)
    }

    // FULL RESCAN. TESTS AND DIAGNOSTICS ONLY -- O(capacity).
    // BEFORE THE FIRST WRAP THE VALID ENTRIES ARE EXACTLY [0, count).
    pub fn recount_slow(&self) -> usize {
        self.latencies[..self.count]
            .iter()
            .filter(|&&v| self.is_slow(v))
            .count()
    }
}

// PREDICTION TRACK
// PAIRS THE ESTIMATE TAKEN AT ADMISSION WITH THE LATENCY OBSERVED AT
// COMPLETION. RUNNING ABSOLUTE ERROR SUM, O(1) PER RECORD.

#[derive(Clone, Copy, Default)]
struct PredictionSample {
    predicted: u64,
    diff: u64,
}

pub struct PredictionTrack {
    samples: Vec<PredictionSample>,
    index: usize,
    count: usize,
    total_diff: u64,
}

impl PredictionTrack {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            anyhow::bail!("PREDICTION TRACK CAPACITY MUST BE POSITIVE");
        }
        Ok(Self {
            samples: vec![PredictionSample::default(); capacity],
            index: 0,
            count: 0,
            total_diff: 0,
        })
    }

    pub fn reset(&mut self) {
        self.samples.fill(PredictionSample::default());
        self.index = 0;
        self.count = 0;
        self.total_diff = 0;
    }

    pub fn record(&mut self, predicted: u64, observed: u64) {
        let capacity = self.samples.len();
        let sample = PredictionSample {
            predicted,
            diff: predicted.abs_diff(observed),
        };
        let prev = std::mem::replace(&mut self.samples[self.index], sample);
        self.total_diff = self.total_diff - prev.diff + sample.diff;
        self.index = (self.index + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn total_diff(&self) -> u64 {
        self.total_diff
    }

    pub fn mean_abs_error(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        self.total_diff / self.count as u64
    }

    pub fn last_predicted(&self) -> Option<u64> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.samples.len();
        Some(self.samples[(self.index + capacity - 1) % capacity].predicted)
    }
}
