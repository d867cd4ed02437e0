use std::io::Read;
use std::path::Path;

use anyhow::Result;
use regex::Regex;

use super::device_name;
use crate::blockdev::BlockDevice;

const KERNEL_CONFIG: &str = "/proc/config.gz";

fn check_kernel_config() -> bool {
    let file = match std::fs::File::open(KERNEL_CONFIG) {
        Ok(f) => f,
        Err(_) => {
            println!("  {:<24}NOT FOUND (SKIPPED)", KERNEL_CONFIG);
            return true;
        }
    };
    let mut decoder = flate2::read::GzDecoder::new(file);
    let mut config = String::new();
    if decoder.read_to_string(&mut config).is_err() {
        println!("  {:<24}UNREADABLE (SKIPPED)", KERNEL_CONFIG);
        return true;
    }
    let found = config
        .lines()
        .any(|l| l == "CONFIG_IOSCHED_CFQ=y" || l == "CONFIG_IOSCHED_CFQ=m");
    if found {
        println!("  CONFIG_IOSCHED_CFQ      OK");
    } else {
        println!("  CONFIG_IOSCHED_CFQ      NOT FOUND -- cfq may not be available");
    }
    found
}

// "noop deadline [cfq]" -> Some("cfq")
pub fn active_scheduler(sysfs: &str) -> Option<String> {
    let re = Regex::new(r"\[([A-Za-z0-9_-]+)\]").ok()?;
    re.captures(sysfs).map(|c| c[1].to_string())
}

fn check_scheduler(dev: &str) -> bool {
    let path = format!("/sys/block/{}/queue/scheduler", dev);
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => {
            println!("  {:<24}NOT FOUND ({})", "scheduler", path);
            return false;
        }
    };
    match active_scheduler(&raw) {
        Some(name) if name == "cfq" => {
            println!("  {:<24}OK (cfq)", "scheduler");
            true
        }
        Some(name) => {
            println!("  {:<24}ACTIVE {} (expected cfq: echo cfq > {})", "scheduler", name, path);
            false
        }
        None => {
            println!("  {:<24}UNPARSEABLE ({})", "scheduler", raw.trim());
            false
        }
    }
}

pub fn run_check(device: &Path) -> Result<()> {
    println!("MITTCFQ DEPENDENCY CHECK");
    println!();

    let mut ok = true;
    let dev = device.to_string_lossy();

    println!("DEVICE:");
    match BlockDevice::open(device).and_then(|d| d.size_bytes()) {
        Ok(size) => println!("  {:<24}OK ({} MB, O_DIRECT)", dev, size / (1024 * 1024)),
        Err(e) => {
            println!("  {:<24}FAILED ({:#})", dev, e);
            ok = false;
        }
    }
    if !check_scheduler(device_name(&dev)) {
        ok = false;
    }
    println!();

    println!("KERNEL CONFIG:");
    if !check_kernel_config() {
        ok = false;
    }
    println!();

    if ok {
        println!("ALL CHECKS PASSED");
    } else {
        println!("SOME CHECKS FAILED");
        std::process::exit(1);
    }

    Ok(())
}
