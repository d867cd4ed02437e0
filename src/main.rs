// MITTCFQ v0.3.2 -- LATENCY-SLA GATE FOR A POSITION-AWARE I/O SCHEDULER
//
// THE GATE ITSELF LIVES IN THE LIBRARY (HISTORY + ESTIMATOR).
// THIS BINARY DRIVES IT: FOREGROUND PROBE, BACKGROUND NOISE, OFFLINE REPLAY,
// AND AN ENVIRONMENT CHECK.

mod blockdev;
mod cli;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Parser, Subcommand};

use cli::noise::NoiseArgs;
use cli::probe::ProbeArgs;
use cli::replay::ReplayArgs;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "mittcfq")]
#[command(about = "MITTCFQ -- LATENCY-SLA ADMISSION GATE FOR CFQ")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    // TIMED FOREGROUND READS THROUGH THE GATE
    Probe(ProbeArgs),

    // REPLAY THE BACKGROUND NOISE SCHEDULE AGAINST A DEVICE
    Noise(NoiseArgs),

    // FEED RECORDED LATENCIES THROUGH THE HISTORY GATE
    Replay(ReplayArgs),

    // VERIFY DEVICE, ACTIVE I/O SCHEDULER, KERNEL CONFIG
    Check {
        #[arg(long, default_value = "/dev/sdb")]
        device: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Probe(args) => {
            ctrlc::set_handler(move || {
                SHUTDOWN.store(true, Ordering::Relaxed);
            })?;

            let p = args.sla.params()?;
            println!("MITTCFQ v0.3.2");
            println!("DEVICE:          {}", args.device.display());
            println!("THRESHOLD:       {} ns ({} slow of {} allowed)",
                     p.latency_threshold_ns, p.slowcount_threshold, p.capacity);
            println!("BUDGET:          {}", args.budget_ns
                     .map(|b| format!("{} ns", b))
                     .unwrap_or_else(|| "NONE (HISTORY ONLY)".to_string()));
            println!("IOPS:            {}", args.iops);
            println!();

            println!("MITTCFQ IS PROBING (CTRL+C TO EXIT)");
            cli::probe::run_probe(args, &SHUTDOWN)?;
        }
        Command::Noise(args) => {
            ctrlc::set_handler(move || {
                SHUTDOWN.store(true, Ordering::Relaxed);
            })?;

            println!("MITTCFQ NOISE (CTRL+C TO EXIT)");
            cli::noise::run_noise(args, &SHUTDOWN)?;
        }
        Command::Replay(args) => cli::replay::run_replay(args)?,
        Command::Check { device } => cli::check::run_check(device)?,
    }

    println!("MITTCFQ OUT.");
    Ok(())
}
