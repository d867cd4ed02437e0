// BACKGROUND NOISE GENERATOR -- REPLAYS A RECORDED CONCURRENCY SCHEDULE
// N WORKERS, EACH ISSUING 1MB DIRECT READS AT RANDOM BLOCKS WHEN THE CURRENT
// SLOT ADMITS ITS ID. SHARES NO STATE WITH THE SLA GATE.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use rand::Rng;

use mittcfq::noise::{NoiseAction, ReplaySchedule, NOISE_BLOCK_COUNT, NOISE_BLOCK_SIZE, NOISE_THREADS, PERIOD_US};
use mittcfq::timestamp::realtime_us;
use mittcfq::{log_error, log_info, log_warn};

use crate::blockdev::{AlignedBuf, BlockDevice};

#[derive(Args, Debug)]
pub struct NoiseArgs {
    // TARGET BLOCK DEVICE
    #[arg(long, default_value = "/dev/sdb")]
    pub device: PathBuf,

    // WORKER THREADS (IDS 0..N)
    #[arg(long, default_value_t = NOISE_THREADS)]
    pub threads: u32,

    // RANDOM OFFSETS ARE DRAWN FROM [0, BLOCK_COUNT) x 1MB
    #[arg(long, default_value_t = NOISE_BLOCK_COUNT)]
    pub block_count: u64,

    // SCHEDULE FILE OVERRIDE (COMMA/WHITESPACE SEPARATED SLOT COUNTS)
    #[arg(long)]
    pub schedule: Option<PathBuf>,

    // SLOT LENGTH IN MICROSECONDS
    #[arg(long, default_value_t = PERIOD_US)]
    pub period_us: u64,

    // STOP AFTER N SECONDS (0 = UNTIL CTRL+C)
    #[arg(long, default_value_t = 0)]
    pub duration: u64,
}

#[derive(Default)]
struct NoiseCounters {
    reads: AtomicU64,
    errors: AtomicU64,
}

fn load_schedule(args: &NoiseArgs) -> Result<ReplaySchedule> {
    match &args.schedule {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("CANNOT READ SCHEDULE {}", path.display()))?;
            ReplaySchedule::parse(&text, args.period_us)
        }
        None if args.period_us == PERIOD_US => Ok(ReplaySchedule::default()),
        None => {
            let reference = ReplaySchedule::default();
            let slots = (0..reference.len() as u64)
                .map(|i| reference.max_threads(i * PERIOD_US))
                .collect();
            ReplaySchedule::new(slots, args.period_us)
        }
    }
}

fn worker(
    id: u32,
    dev: BlockDevice,
    block_count: u64,
    schedule: Arc<ReplaySchedule>,
    counters: Arc<NoiseCounters>,
    shutdown: &'static AtomicBool,
) {
    let mut buf = match AlignedBuf::new(NOISE_BLOCK_SIZE, NOISE_BLOCK_SIZE) {
        Ok(b) => b,
        Err(e) => {
            log_error!("WORKER {}: {:#}", id, e);
            return;
        }
    };
    let mut rng = rand::thread_rng();

    while !shutdown.load(Ordering::Relaxed) {
        match schedule.action(id, realtime_us()) {
            NoiseAction::Issue => {
                let offset = rng.gen_range(0..block_count) * buf.len() as u64;
                match dev.read_block(&mut buf, offset) {
                    Ok(_) => {
                        counters.reads.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        // ONE WARNING PER WORKER IS ENOUGH TO DIAGNOSE A BAD DEVICE
                        if counters.errors.fetch_add(1, Ordering::Relaxed) < NOISE_THREADS as u64 {
                            log_warn!("WORKER {}: {:#}", id, e);
                        }
                    }
                }
            }
            NoiseAction::Wait { us } | NoiseAction::Idle { us } => {
                std::thread::sleep(Duration::from_micros(us));
            }
        }
    }
}

// RETURNS HOW MANY WORKERS PANICKED. EACH ONE IS LOGGED.
fn join_workers(handles: Vec<JoinHandle<()>>) -> usize {
    let mut panicked = 0;
    for (id, h) in handles.into_iter().enumerate() {
        if h.join().is_err() {
            log_error!("WORKER {}: PANICKED", id);
            panicked += 1;
        }
    }
    panicked
}

pub fn run_noise(args: &NoiseArgs, shutdown: &'static AtomicBool) -> Result<()> {
    let schedule = Arc::new(load_schedule(args)?);
    let counters = Arc::new(NoiseCounters::default());

    log_info!(
        "NOISE: {} WORKERS ON {}, {} SLOTS x {}us (PEAK {}, ACTIVE {})",
        args.threads, args.device.display(), schedule.len(), schedule.period_us(),
        schedule.peak(), schedule.active_slots(),
    );

    let mut handles = Vec::with_capacity(args.threads as usize);
    for id in 0..args.threads {
        let dev = BlockDevice::open(&args.device)?;
        let schedule = Arc::clone(&schedule);
        let counters = Arc::clone(&counters);
        let block_count = args.block_count.max(1);
        handles.push(std::thread::spawn(move || {
            worker(id, dev, block_count, schedule, counters, shutdown)
        }));
    }

    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    let mut prev_reads = 0u64;
    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        let reads = counters.reads.load(Ordering::Relaxed);
        let slot = schedule.slot_index(realtime_us());
        println!(
            "noise reads/s: {:<6} slot: {:<4} allowance: {:<3} errors: {}",
            reads - prev_reads, slot, schedule.max_threads(realtime_us()),
            counters.errors.load(Ordering::Relaxed),
        );
        prev_reads = reads;
        if deadline.map_or(false, |d| Instant::now() >= d) {
            shutdown.store(true, Ordering::Relaxed);
        }
    }

    join_workers(handles);
    log_info!("NOISE: {} READS TOTAL", counters.reads.load(Ordering::Relaxed));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_counts_panicked_workers() {
        let handles = vec![
            std::thread::spawn(|| {}),
            std::thread::spawn(|| panic!("worker down")),
            std::thread::spawn(|| {}),
        ];
        assert_eq!(join_workers(handles), 1);
    }
}
