// MITTCFQ GATED LANE TESTS
// FOREGROUND FEED, BACKGROUND GATING, BUDGET AGAINST IN-FLIGHT WORK, CLEANUP
//
// I/O IS SCRIPTED: FOREGROUND REQUESTS LIVE BELOW BG_BASE, BACKGROUND ABOVE.

use anyhow::{bail, Result};

use mittcfq::admission::{Decision, SlaController};
use mittcfq::cost::ConstantCost;
use mittcfq::device::PendingRequest;
use mittcfq::estimator::QueueLatencyEstimator;
use mittcfq::lane::GateLane;
use mittcfq::tuning::{SlaParams, REQ_LAT_NS};

const BG_BASE: u64 = 1 << 40;

fn small() -> SlaParams {
    SlaParams::new(100, 1, 3).unwrap()
}

fn fg(i: u64) -> PendingRequest {
    PendingRequest::new(i * 8, 8)
}

fn bg(i: u64) -> PendingRequest {
    PendingRequest::new(BG_BASE + i * 8, 8)
}

fn flat_lane(per_request_ns: u64, budget_ns: u64) -> GateLane {
    let est = QueueLatencyEstimator::new(ConstantCost::new(per_request_ns));
    GateLane::new(SlaController::new(small(), est).unwrap().with_budget(budget_ns))
}

// === HISTORY GATE REOPENS ===

#[test]
fn gate_reopens_as_foreground_completions_age_out_slow_samples() {
    let mut lane = GateLane::new(SlaController::with_defaults(small()).unwrap());
    let fg_latencies = [50, 50, 200, 10, 10, 10, 10, 10, 10, 10];

    let mut decisions = Vec::new();
    for (i, &lat) in fg_latencies.iter().enumerate() {
        let i = i as u64;
        let out = lane
            .step(fg(i), Some(bg(i)), |rq| Ok(if rq.pos >= BG_BASE { 0 } else { lat }))
            .unwrap();
        assert_eq!(out.latency_ns, lat);
        decisions.push(out.background.unwrap());
    }

    use Decision::*;
    // WARM-UP, THEN TWO FAST EVICTIONS AT QUOTA, THEN THE 200 LEAVES
    assert_eq!(
        decisions,
        vec![Admit, Admit, Admit, RejectHistory, RejectHistory, Admit, Admit, Admit, Admit, Admit]
    );
    assert_eq!(lane.controller().history().slow_count(), 0);
}

#[test]
fn long_run_keeps_admitting_after_a_slow_burst() {
    let mut lane = GateLane::new(SlaController::with_defaults(small()).unwrap());
    for i in 0..1_000u64 {
        let lat = match i {
            2 => 200,
            _ => if i < 3 { 50 } else { 10 },
        };
        lane.step(fg(i), Some(bg(i)), |rq| Ok(if rq.pos >= BG_BASE { 0 } else { lat }))
            .unwrap();
    }
    let s = lane.controller().stats();
    assert_eq!(s.completions, 1_000);
    assert_eq!(s.admitted + s.rejected_history, 1_000);
    assert_eq!(s.rejected_history, 2);
}

#[test]
fn foreground_feeds_history_when_background_rejected() {
    let mut lane = GateLane::new(SlaController::with_defaults(small()).unwrap());
    for i in 0..3 {
        lane.step(fg(i), None, |_| Ok(500)).unwrap();
    }
    // OVER QUOTA: BACKGROUND HELD BACK, FOREGROUND STILL COUNTED
    let out = lane.step(fg(3), Some(bg(3)), |_| Ok(500)).unwrap();
    assert_eq!(out.background, Some(Decision::RejectHistory));
    assert_eq!(out.background_ns, None);
    assert_eq!(lane.controller().stats().completions, 4);
}

// === PREDICTED BUDGET ===

#[test]
fn budget_sees_in_flight_foreground_and_candidate() {
    // ONE IN FLIGHT + ONE PENDING = 2 x 10
    let mut lane = flat_lane(10, 15);
    let out = lane.step(fg(0), Some(bg(0)), |_| Ok(1)).unwrap();
    assert_eq!(out.background, Some(Decision::RejectPredicted { estimate_ns: 20 }));
    // FOREGROUND ESTIMATE WAS TAKEN WITH ONLY ITSELF PENDING
    assert_eq!(out.predicted_ns, 10);

    let mut lane = flat_lane(10, 20);
    let out = lane.step(fg(0), Some(bg(0)), |_| Ok(1)).unwrap();
    assert_eq!(out.background, Some(Decision::Admit));
    assert_eq!(out.background_ns, Some(1));
}

#[test]
fn zero_budget_rejects_with_reference_cost() {
    let est = QueueLatencyEstimator::default();
    let ctl = SlaController::new(small(), est).unwrap().with_budget(0);
    let mut lane = GateLane::new(ctl);
    for i in 0..5 {
        let out = lane.step(fg(i), Some(bg(i)), |_| Ok(1)).unwrap();
        assert_eq!(
            out.background,
            Some(Decision::RejectPredicted { estimate_ns: 2 * REQ_LAT_NS })
        );
    }
    assert_eq!(lane.controller().stats().rejected_predicted, 5);
}

// === CONTEXT BOOKKEEPING ===

#[test]
fn context_drained_after_each_step() {
    let mut lane = flat_lane(10, 1_000);
    lane.step(fg(4), Some(bg(2)), |_| Ok(1)).unwrap();
    let ctx = lane.context();
    assert!(ctx.driver.is_empty());
    assert!(ctx.queue.is_empty());
    // BACKGROUND COMPLETES LAST
    assert_eq!(ctx.head_position(), bg(2).end());

    let mut lane = flat_lane(10, 0);
    lane.step(fg(4), Some(bg(2)), |_| Ok(1)).unwrap();
    assert_eq!(lane.context().head_position(), fg(4).end());
}

#[test]
fn rejected_background_is_never_issued() {
    let mut lane = flat_lane(10, 0);
    let mut issued = Vec::new();
    lane.step(fg(1), Some(bg(1)), |rq| {
        issued.push(rq.pos);
        Ok(1)
    })
    .unwrap();
    assert_eq!(issued, vec![fg(1).pos]);
}

#[test]
fn failed_foreground_read_is_not_recorded() {
    let mut lane = flat_lane(10, 1_000);
    let r = lane.step(fg(0), Some(bg(0)), |rq| -> Result<u64> {
        if rq.pos < BG_BASE {
            bail!("EIO");
        }
        Ok(1)
    });
    assert!(r.is_err());
    assert!(lane.controller().history().is_empty());
    assert!(lane.context().driver.is_empty());
}
