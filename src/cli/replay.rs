// OFFLINE REPLAY -- FEED RECORDED LATENCIES THROUGH THE HISTORY GATE
// ONE SAMPLE (NS) PER LINE. THE GATE DECISION IS TAKEN BEFORE EACH ACCEPT.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use mittcfq::history::History;
use mittcfq::log_warn;

use super::SlaArgs;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    // SAMPLE FILE ("-" = STDIN)
    #[arg(default_value = "-")]
    pub input: PathBuf,

    // PRINT EVERY DECISION
    #[arg(long)]
    pub verbose: bool,

    #[command(flatten)]
    pub sla: SlaArgs,
}

#[derive(Default, Debug, PartialEq, Eq)]
pub struct ReplayTotals {
    pub samples: u64,
    pub slow: u64,
    pub admitted: u64,
    pub rejected: u64,
}

pub fn replay_lines<R: BufRead>(history: &mut History, input: R, verbose: bool) -> Result<ReplayTotals> {
    let mut totals = ReplayTotals::default();
    for (lineno, line) in input.lines().enumerate() {
        let line = line?;
        let tok = line.split('#').next().unwrap_or("").trim();
        if tok.is_empty() {
            continue;
        }
        let value: u64 = match tok.parse() {
            Ok(v) => v,
            Err(_) => {
                log_warn!("LINE {}: SKIPPING {:?}", lineno + 1, tok);
                continue;
            }
        };

        let admit = history.can_accept(value);
        if admit {
            totals.admitted += 1;
        } else {
            totals.rejected += 1;
        }
        history.accept(value);
        totals.samples += 1;
        if history.is_slow(value) {
            totals.slow += 1;
        }

        if verbose {
            println!(
                "{:<8} {:<12} {:<7} slow: {}/{}",
                totals.samples, value, if admit { "ADMIT" } else { "REJECT" },
                history.slow_count(), history.slowcount_threshold(),
            );
        }
    }
    Ok(totals)
}

pub fn run_replay(args: &ReplayArgs) -> Result<()> {
    let mut history = History::new(args.sla.params()?)?;

    let totals = if args.input.as_os_str() == "-" {
        replay_lines(&mut history, std::io::stdin().lock(), args.verbose)?
    } else {
        let f = std::fs::File::open(&args.input)
            .with_context(|| format!("CANNOT OPEN {}", args.input.display()))?;
        replay_lines(&mut history, BufReader::new(f), args.verbose)?
    };

    if history.slow_count() != history.recount_slow() {
        bail!(
            "SLOW COUNT DRIFT: RUNNING {} vs RESCAN {}",
            history.slow_count(), history.recount_slow()
        );
    }

    println!("\n{}", "=".repeat(50));
    println!("MITTCFQ REPLAY");
    println!("{}", "=".repeat(50));
    println!("  SAMPLES:           {}", totals.samples);
    if totals.samples > 0 {
        println!("  SLOW:              {} ({:.2}%)", totals.slow,
                 totals.slow as f64 / totals.samples as f64 * 100.0);
        println!("  ADMIT / REJECT:    {} / {}", totals.admitted, totals.rejected);
    }
    println!("  WINDOW:            {}/{} SLOW={} (THRESHOLD {})",
             history.len(), history.capacity(), history.slow_count(), history.slowcount_threshold());
    Ok(())
}
