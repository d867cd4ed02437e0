// FOREGROUND PROBE -- TIMED DIRECT READS THAT FEED THE SLA GATE
// EVERY ITERATION ISSUES ONE FOREGROUND READ (ALWAYS, ITS LATENCY FEEDS THE
// HISTORY) AND OFFERS ONE BACKGROUND READ TO THE GATE WHILE THE FOREGROUND READ
// IS IN FLIGHT. ONE TELEMETRY LINE PER SECOND.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use rand::Rng;

use mittcfq::admission::SlaController;
use mittcfq::device::PendingRequest;
use mittcfq::event::EventLog;
use mittcfq::lane::GateLane;
use mittcfq::timestamp::alloc_ts;
use mittcfq::tuning::SECTOR_SIZE;
use mittcfq::{log_info, log_warn};

use super::SlaArgs;
use crate::blockdev::{AlignedBuf, BlockDevice};

const PROBE_BLOCK_SIZE: usize = 4096;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    // BLOCK DEVICE TO PROBE
    #[arg(long, default_value = "/dev/sdb")]
    pub device: PathBuf,

    // TARGET FOREGROUND READS PER SECOND
    #[arg(long, default_value_t = 200)]
    pub iops: u64,

    // HOLD BACK BACKGROUND READS WHEN THE PREDICTED QUEUEING DELAY EXCEEDS THIS (NS)
    #[arg(long)]
    pub budget_ns: Option<u64>,

    // STOP AFTER N SECONDS (0 = UNTIL CTRL+C)
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    // DUMP FULL EVENT LOG ON EXIT
    #[arg(long)]
    pub dump_log: bool,

    #[command(flatten)]
    pub sla: SlaArgs,
}

pub fn run_probe(args: &ProbeArgs, shutdown: &AtomicBool) -> Result<()> {
    let params = args.sla.params()?;
    let dev = BlockDevice::open(&args.device)?;
    let blocks = (dev.size_bytes()? / PROBE_BLOCK_SIZE as u64).max(1);
    let mut buf = AlignedBuf::new(PROBE_BLOCK_SIZE, PROBE_BLOCK_SIZE)?;

    let mut ctl = SlaController::with_defaults(params)?;
    ctl.set_budget(args.budget_ns);
    let mut lane = GateLane::new(ctl);
    let mut log = EventLog::new();
    let mut rng = rand::thread_rng();

    log_info!("PROBING {} ({} BLOCKS OF {} BYTES)", dev.path().display(), blocks, PROBE_BLOCK_SIZE);

    let pace = Duration::from_nanos(1_000_000_000 / args.iops.max(1));
    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    let sectors = PROBE_BLOCK_SIZE as u64 / SECTOR_SIZE;

    let mut tick_start = Instant::now();
    let mut prev = lane.controller().stats();
    let mut lat_sum: u64 = 0;
    let mut bg_reads: u64 = 0;
    let mut last_estimate: u64 = 0;

    let mut read = |rq: &PendingRequest| -> Result<u64> {
        let ts = alloc_ts();
        dev.read_block(&mut buf, rq.pos * SECTOR_SIZE)?;
        Ok(ts.elapsed_ns())
    };

    while !shutdown.load(Ordering::Relaxed) && deadline.map_or(true, |d| Instant::now() < d) {
        let started = Instant::now();
        let fg = PendingRequest::new(rng.gen_range(0..blocks) * sectors, sectors);
        let bg = PendingRequest::new(rng.gen_range(0..blocks) * sectors, sectors);

        match lane.step(fg, Some(bg), &mut read) {
            Ok(out) => {
                lat_sum += out.latency_ns;
                last_estimate = out.predicted_ns;
                if out.background_ns.is_some() {
                    bg_reads += 1;
                }
            }
            Err(e) => log_warn!("{:#}", e),
        }

        if tick_start.elapsed() >= Duration::from_secs(1) {
            let ctl = lane.controller();
            let stats = ctl.stats();
            let done = stats.completions - prev.completions;
            let admitted = stats.admitted - prev.admitted;
            let rejected = (stats.rejected_history - prev.rejected_history)
                + (stats.rejected_predicted - prev.rejected_predicted);
            let avg = if done > 0 { lat_sum / done } else { 0 };
            let h = ctl.history();

            println!(
                "reads/s: {:<6} avg: {}us slow: {}/{} window: {}/{} bg admit: {:<6} reject: {:<6} bg reads: {:<6} est: {}us err: {}us",
                done, avg / 1000, h.slow_count(), h.slowcount_threshold(),
                h.len(), h.capacity(), admitted, rejected, bg_reads,
                last_estimate / 1000, ctl.predictions().mean_abs_error() / 1000,
            );
            log.snapshot(done, avg, h.slow_count() as u64, admitted, rejected, last_estimate);

            prev = stats;
            lat_sum = 0;
            bg_reads = 0;
            tick_start = Instant::now();
        }

        if let Some(rest) = pace.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if args.dump_log {
        log.dump();
    }
    log.summary();
    Ok(())
}
