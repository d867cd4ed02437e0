// MITTCFQ BACKGROUND NOISE SCHEDULE
// CYCLIC REPLAY TABLE FOR THE LOAD GENERATOR. PURE LOGIC, NO I/O.
//
// TIME IS CUT INTO PERIOD_US SLOTS. SLOT i ALLOWS slots[i] CONCURRENT
// READERS: WORKER id FIRES ONLY WHEN slots[i] > id. A WORKER ALSO NEEDS
// ENOUGH TIME LEFT IN THE SLOT (max * PERIOD / 100) OR THE READ WOULD
// SPILL INTO THE NEXT ONE.

use anyhow::{bail, Context, Result};

pub const NOISE_BLOCK_SIZE: usize = 1024 * 1024;
pub const NOISE_BLOCK_COUNT: u64 = 1024 * 900;
pub const NOISE_THREADS: u32 = 64;
pub const PERIOD_US: u64 = 10_000;
pub const IDLE_US: u64 = 5_000;

// RECORDED PER-SLOT CONCURRENCY: 600 SLOTS x 10MS = 6S CYCLE
const REFERENCE_SLOTS: [u32; 600] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 12, 0, 0, 0, 0, 0, 1, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0,
    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 3, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 1, 0, 0, 0, 0, 0, 0, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 6, 0, 1,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
    0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 14,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0,
    0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0,
    15, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseAction {
    // ISSUE ONE READ NOW
    Issue,
    // ADMITTED THIS SLOT BUT TOO LATE IN IT. WAIT FOR THE BOUNDARY.
    Wait { us: u64 },
    // NOT ADMITTED THIS SLOT
    Idle { us: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaySchedule {
    slots: Vec<u32>,
    period_us: u64,
}

impl Default for ReplaySchedule {
    fn default() -> Self {
        Self {
            slots: REFERENCE_SLOTS.to_vec(),
            period_us: PERIOD_US,
        }
    }
}

impl ReplaySchedule {
    pub fn new(slots: Vec<u32>, period_us: u64) -> Result<Self> {
        if slots.is_empty() {
            bail!("NOISE SCHEDULE HAS NO SLOTS");
        }
        if period_us == 0 {
            bail!("NOISE PERIOD MUST BE POSITIVE");
        }
        Ok(Self { slots, period_us })
    }

    // COMMA / WHITESPACE SEPARATED SLOT COUNTS. '#' STARTS A COMMENT.
    pub fn parse(text: &str, period_us: u64) -> Result<Self> {
        let mut slots = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("");
            for tok in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if tok.is_empty() {
                    continue;
                }
                let v: u32 = tok
                    .parse()
                    .with_context(|| format!("BAD SLOT VALUE {:?} ON LINE {}", tok, lineno + 1))?;
                slots.push(v);
            }
        }
        Self::new(slots, period_us)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    pub fn cycle_us(&self) -> u64 {
        self.period_us * self.slots.len() as u64
    }

    pub fn slot_index(&self, now_us: u64) -> usize {
        ((now_us / self.period_us) % self.slots.len() as u64) as usize
    }

    pub fn max_threads(&self, now_us: u64) -> u32 {
        self.slots[self.slot_index(now_us)]
    }

    pub fn peak(&self) -> u32 {
        self.slots.iter().copied().max().unwrap_or(0)
    }

    // SLOTS WITH ANY NOISE AT ALL
    pub fn active_slots(&self) -> usize {
        self.slots.iter().filter(|&&s| s > 0).count()
    }

    pub fn action(&self, id: u32, now_us: u64) -> NoiseAction {
        let max = self.max_threads(now_us);
        if max <= id {
            return NoiseAction::Idle { us: IDLE_US };
        }
        let remain = self.period_us - (now_us % self.period_us);
        if remain >= max as u64 * self.period_us / 100 {
            NoiseAction::Issue
        } else {
            NoiseAction::Wait { us: remain }
        }
    }
}
