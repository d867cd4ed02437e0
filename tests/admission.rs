// MITTCFQ ADMISSION TESTS
// COMPLETION FEED, HISTORY-FIRST DECISIONS, PREDICTED-LATENCY BUDGET, STATS

use mittcfq::admission::{Decision, SlaController};
use mittcfq::cost::ConstantCost;
use mittcfq::device::{DeviceContext, PendingRequest};
use mittcfq::estimator::QueueLatencyEstimator;
use mittcfq::timestamp::{alloc_ts, SlaTimestamp};
use mittcfq::tuning::SlaParams;

fn small() -> SlaParams {
    SlaParams::new(100, 1, 3).unwrap()
}

fn busy_device(n: u64) -> DeviceContext {
    let mut dev = DeviceContext::new();
    for i in 0..n {
        dev.enqueue(PendingRequest::new(i * 8, 8));
    }
    dev
}

// === HISTORY GATE ===

#[test]
fn warm_up_admits() {
    let mut ctl = SlaController::with_defaults(small()).unwrap();
    let dev = DeviceContext::new();
    assert_eq!(ctl.decide(&dev, u64::MAX), Decision::Admit);
}

#[test]
fn history_rejection_follows_window() {
    let mut ctl = SlaController::with_defaults(small()).unwrap();
    let dev = DeviceContext::new();
    for v in [50, 50, 200] {
        ctl.on_complete_ns(v);
    }
    assert_eq!(ctl.decide(&dev, 0), Decision::RejectHistory);
    assert_eq!(ctl.history().slow_count(), 1);

    let s = ctl.stats();
    assert_eq!(s.completions, 3);
    assert_eq!(s.rejected_history, 1);
    assert_eq!(s.admitted, 0);
}

#[test]
fn reconfiguration_readmits() {
    let mut ctl = SlaController::with_defaults(small()).unwrap();
    let dev = DeviceContext::new();
    for v in [500, 500, 500] {
        ctl.on_complete_predicted(v, 400);
    }
    assert!(!ctl.decide(&dev, 0).is_admit());
    assert_eq!(ctl.predictions().mean_abs_error(), 100);

    ctl.set_parameter(1_000, 1);
    assert!(ctl.decide(&dev, 0).is_admit());
    assert!(ctl.predictions().is_empty());
}

// === PREDICTED BUDGET ===

#[test]
fn budget_rejects_deep_queue() {
    let est = QueueLatencyEstimator::new(ConstantCost::new(10));
    let mut ctl = SlaController::new(small(), est).unwrap().with_budget(25);

    assert_eq!(ctl.decide(&busy_device(2), 0), Decision::Admit);
    assert_eq!(
        ctl.decide(&busy_device(3), 0),
        Decision::RejectPredicted { estimate_ns: 30 }
    );
    let s = ctl.stats();
    assert_eq!(s.admitted, 1);
    assert_eq!(s.rejected_predicted, 1);
}

#[test]
fn budget_equal_to_estimate_admits() {
    let est = QueueLatencyEstimator::new(ConstantCost::new(10));
    let mut ctl = SlaController::new(small(), est).unwrap().with_budget(30);
    assert_eq!(ctl.decide(&busy_device(3), 0), Decision::Admit);
}

#[test]
fn history_checked_before_estimate() {
    let est = QueueLatencyEstimator::new(ConstantCost::new(10));
    let mut ctl = SlaController::new(small(), est).unwrap().with_budget(0);
    for v in [500, 500, 500] {
        ctl.on_complete_ns(v);
    }
    // BOTH WOULD REJECT. HISTORY WINS.
    assert_eq!(ctl.decide(&busy_device(5), 0), Decision::RejectHistory);
}

#[test]
fn no_budget_ignores_queue_depth() {
    let mut ctl = SlaController::with_defaults(small()).unwrap();
    assert_eq!(ctl.decide(&busy_device(1_000), 0), Decision::Admit);
    assert_eq!(ctl.predict(&busy_device(2)), 2 * ConstantCost::default().per_request_ns);
}

#[test]
fn clearing_budget_restores_history_only() {
    let est = QueueLatencyEstimator::new(ConstantCost::new(10));
    let mut ctl = SlaController::new(small(), est).unwrap().with_budget(0);
    assert!(!ctl.decide(&busy_device(1), 0).is_admit());
    ctl.set_budget(None);
    assert!(ctl.decide(&busy_device(1), 0).is_admit());
}

// === COMPLETION FEED ===

#[test]
fn timestamp_completion_records_elapsed() {
    let mut ctl = SlaController::with_defaults(small()).unwrap();
    let ts = alloc_ts();
    let start = ts.start_ns();
    let latency = ctl.on_complete(ts);
    assert!(start > 0);
    assert_eq!(ctl.history().len(), 1);
    assert_eq!(ctl.stats().completions, 1);
    // A FRESH TIMESTAMP IS FAR BELOW ANY SANE THRESHOLD... UNLESS THE MACHINE STALLS
    assert!(latency < 1_000_000_000);
}

#[test]
fn stale_timestamp_is_slow() {
    let mut ctl = SlaController::with_defaults(small()).unwrap();
    let ts = SlaTimestamp::from_ns(alloc_ts().start_ns().saturating_sub(1_000_000));
    let latency = ctl.on_complete(ts);
    assert!(latency >= 1_000_000);
    assert_eq!(ctl.history().slow_count(), 1);
}

#[test]
fn invalid_params_fail_at_construction() {
    let params = SlaParams { capacity: 0, ..SlaParams::default() };
    assert!(SlaController::with_defaults(params).is_err());
}

#[test]
fn decision_labels() {
    assert_eq!(Decision::Admit.label(), "ADMIT");
    assert_eq!(Decision::RejectHistory.label(), "REJECT_HISTORY");
    assert_eq!(Decision::RejectPredicted { estimate_ns: 1 }.label(), "REJECT_PREDICTED");
}
