pub mod check;
pub mod noise;
pub mod probe;
pub mod replay;

use anyhow::Result;
use clap::Args;

use mittcfq::tuning::{
    SlaParams, DEFAULT_LATENCY_THRESHOLD_NS, DEFAULT_SLOWCOUNT_THRESHOLD, HISTORY_CAPACITY,
};

// SLA KNOBS SHARED BY EVERY SUBCOMMAND THAT RUNS THE GATE
#[derive(Args, Clone, Debug)]
pub struct SlaArgs {
    // SAMPLES ABOVE THIS ARE SLOW (20MS DEFAULT)
    #[arg(long, default_value_t = DEFAULT_LATENCY_THRESHOLD_NS)]
    pub latency_threshold_ns: u64,

    // SLOW SAMPLES TOLERATED IN A FULL WINDOW (100 OF 10000 = P99)
    #[arg(long, default_value_t = DEFAULT_SLOWCOUNT_THRESHOLD)]
    pub slowcount_threshold: usize,

    // WINDOW SIZE IN SAMPLES
    #[arg(long, default_value_t = HISTORY_CAPACITY)]
    pub capacity: usize,
}

impl SlaArgs {
    pub fn params(&self) -> Result<SlaParams> {
        SlaParams::new(self.latency_threshold_ns, self.slowcount_threshold, self.capacity)
    }
}

// "/dev/sdb" -> "sdb". PARTITIONS RESOLVE TO THEMSELVES; SYSFS HAS NO QUEUE FOR THEM.
pub fn device_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_name_strips_dev_prefix() {
        assert_eq!(device_name("/dev/sdb"), "sdb");
        assert_eq!(device_name("nvme0n1"), "nvme0n1");
    }
}
