// MITTCFQ QUEUE LATENCY ESTIMATOR
// PREDICTS THE QUEUEING DELAY A REQUEST ADMITTED NOW WOULD SEE, BY WALKING
// THE PENDING WORK ALREADY AHEAD OF IT:
//   DRIVER TIER:  IN FLIGHT, DISPATCH ORDER
//   DEVICE TIER:  DISPATCHABLE, POSITION ORDER
//   GROUP TIER:   SERVICE-TREE QUEUES, PRIORITY ORDER, POSITION ORDER WITHIN
//
// EACH TIER RESTARTS ITS CURSOR AT THE SAME HEAD POSITION INSTEAD OF CHAINING
// FROM THE PREVIOUS TIER, SO THE SUM IS AN UPPER BOUND, NOT A PREDICTION OF
// THE EXACT END-TO-END SCHEDULE.
//
// EVERY TIER IS SCAN-BOUNDED. THE ESTIMATOR MUST NEVER COST MORE THAN THE
// SCHEDULING DECISION IT INFORMS.

use crate::cost::{ConstantCost, CostModel};
use crate::device::{CfqGroup, DeviceContext, DeviceQueue, DriverList, PendingRequest};
use crate::tuning::{DEFAULT_GROUP_QUEUES, DEFAULT_LINEAR_TIER_REQUESTS, DEFAULT_REQUESTS_PER_QUEUE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanBounds {
    pub driver_requests: usize,
    pub device_requests: usize,
    pub group_queues: usize,
    pub requests_per_queue: usize,
}

impl Default for ScanBounds {
    fn default() -> Self {
        Self {
            driver_requests: DEFAULT_LINEAR_TIER_REQUESTS,
            device_requests: DEFAULT_LINEAR_TIER_REQUESTS,
            group_queues: DEFAULT_GROUP_QUEUES,
            requests_per_queue: DEFAULT_REQUESTS_PER_QUEUE,
        }
    }
}

impl ScanBounds {
    // WORST-CASE NUMBER OF cost() CALLS FOR ONE estimate()
    pub fn max_visits(&self) -> usize {
        self.driver_requests
            .saturating_add(self.device_requests)
            .saturating_add(self.group_queues.saturating_mul(self.requests_per_queue))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierLatency {
    pub driver_ns: u64,
    pub device_ns: u64,
    pub group_ns: u64,
}

impl TierLatency {
    pub fn total(&self) -> u64 {
        self.driver_ns
            .saturating_add(self.device_ns)
            .saturating_add(self.group_ns)
    }
}

pub struct QueueLatencyEstimator<C = ConstantCost> {
    cost: C,
    bounds: ScanBounds,
}

impl Default for QueueLatencyEstimator<ConstantCost> {
    fn default() -> Self {
        Self::new(ConstantCost::default())
    }
}

impl<C: CostModel> QueueLatencyEstimator<C> {
    pub fn new(cost: C) -> Self {
        Self::with_bounds(cost, ScanBounds::default())
    }

    pub fn with_bounds(cost: C, bounds: ScanBounds) -> Self {
        Self { cost, bounds }
    }

    pub fn bounds(&self) -> &ScanBounds {
        &self.bounds
    }

    pub fn cost_model(&self) -> &C {
        &self.cost
    }

    // ACCUMULATE cost() OVER AT MOST `limit` REQUESTS, ADVANCING *cursor
    // TO THE END OF EACH ONE.
    fn walk<'a, I>(&self, cursor: &mut u64, requests: I, limit: usize) -> u64
    where
        I: IntoIterator<Item = &'a PendingRequest>,
    {
        let mut total = 0u64;
        for rq in requests.into_iter().take(limit) {
            total = total.saturating_add(self.cost.request_latency(*cursor, rq.pos, rq.sectors));
            *cursor = rq.end();
        }
        total
    }

    pub fn driver_latency(&self, head: u64, driver: &DriverList) -> u64 {
        let mut cursor = head;
        self.walk(&mut cursor, driver.iter(), self.bounds.driver_requests)
    }

    pub fn request_queue_latency(&self, head: u64, queue: &DeviceQueue) -> u64 {
        let mut cursor = head;
        self.walk(&mut cursor, queue.iter(), self.bounds.device_requests)
    }

    // THE QUEUE BOUND IS SHARED ACROSS ALL GROUPS AND TREES OF THE TIER.
    // THE CURSOR CHAINS FROM QUEUE TO QUEUE WITHIN THE TIER.
    pub fn group_latency<'a, I>(&self, head: u64, groups: I) -> u64
    where
        I: IntoIterator<Item = &'a CfqGroup>,
    {
        let mut cursor = head;
        let mut total = 0u64;
        let queues = groups
            .into_iter()
            .flat_map(|g| g.queues_by_priority())
            .take(self.bounds.group_queues);
        for cfqq in queues {
            let queue_ns = self.walk(&mut cursor, cfqq.iter(), self.bounds.requests_per_queue);
            total = total.saturating_add(queue_ns);
        }
        total
    }

    pub fn estimate_tiers(&self, dev: &DeviceContext) -> TierLatency {
        let head = dev.head_position();
        TierLatency {
            driver_ns: self.driver_latency(head, &dev.driver),
            device_ns: self.request_queue_latency(head, &dev.queue),
            group_ns: self.group_latency(head, dev.groups()),
        }
    }

    pub fn estimate(&self, dev: &DeviceContext) -> u64 {
        self.estimate_tiers(dev).total()
    }
}
