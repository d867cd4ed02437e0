// MITTCFQ SAMPLE TIMESTAMPS
// CAPTURED AT DISPATCH, CONSUMED ONCE AT COMPLETION TO PRODUCE A LATENCY SAMPLE.

pub struct SlaTimestamp {
    start_ns: u64,
}

impl SlaTimestamp {
    pub fn from_ns(start_ns: u64) -> Self {
        Self { start_ns }
    }

    pub fn start_ns(&self) -> u64 {
        self.start_ns
    }

    // CONSUMES THE TIMESTAMP: ONE DISPATCH, ONE SAMPLE
    pub fn elapsed_ns(self) -> u64 {
        now_ns().saturating_sub(self.start_ns)
    }
}

pub fn alloc_ts() -> SlaTimestamp {
    SlaTimestamp { start_ns: now_ns() }
}

pub fn now_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64)
}

// WALL-CLOCK MICROSECONDS. THE NOISE SCHEDULE IS ALIGNED TO REAL TIME
// SO SEPARATE GENERATOR PROCESSES STAY IN PHASE.
pub fn realtime_us() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts);
    }
    (ts.tv_sec as u64) * 1_000_000 + (ts.tv_nsec as u64) / 1_000
}
