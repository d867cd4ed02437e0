// MITTCFQ -- LATENCY-SLA ADMISSION CORE FOR A POSITION-AWARE I/O SCHEDULER
// PURE-RUST LIBRARY: ZERO DEVICE DEPENDENCIES, TESTABLE OFFLINE
//
// history:   SLIDING WINDOW OF COMPLETION LATENCIES, O(1) ADMISSION GATE
// estimator: BOUNDED THREE-TIER QUEUEING DELAY PREDICTION
// admission: THE CALLING CONVENTION BETWEEN THE TWO AND THE SCHEDULER
// lane:      ONE FOREGROUND + GATED BACKGROUND STEP OVER A DEVICE CONTEXT

#[macro_use]
pub mod log;

pub mod admission;
pub mod cost;
pub mod device;
pub mod estimator;
pub mod event;
pub mod history;
pub mod lane;
pub mod noise;
pub mod timestamp;
pub mod tuning;
