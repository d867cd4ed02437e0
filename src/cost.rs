// MITTCFQ POSITIONAL COST MODEL
// (LAST POSITION, CANDIDATE POSITION, LENGTH) -> PREDICTED LATENCY CONTRIBUTION.
// THE REFERENCE POLICY IS FLAT. CALLERS MUST NOT ASSUME POSITION SENSITIVITY.

use crate::tuning::REQ_LAT_NS;

pub trait CostModel {
    fn request_latency(&self, last_pos: u64, start_pos: u64, sectors: u64) -> u64;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantCost {
    pub per_request_ns: u64,
}

impl ConstantCost {
    pub fn new(per_request_ns: u64) -> Self {
        Self { per_request_ns }
    }
}

impl Default for ConstantCost {
    fn default() -> Self {
        Self::new(REQ_LAT_NS)
    }
}

impl CostModel for ConstantCost {
    #[inline]
    fn request_latency(&self, _last_pos: u64, _start_pos: u64, _sectors: u64) -> u64 {
        self.per_request_ns
    }
}

// ANY CLOSURE WITH THE SAME SHAPE IS A MODEL
impl<F> CostModel for F
where
    F: Fn(u64, u64, u64) -> u64,
{
    #[inline]
    fn request_latency(&self, last_pos: u64, start_pos: u64, sectors: u64) -> u64 {
        self(last_pos, start_pos, sectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_cost_ignores_position() {
        let c = ConstantCost::default();
        assert_eq!(c.request_latency(0, 0, 8), REQ_LAT_NS);
        assert_eq!(c.request_latency(0, 1 << 40, 2048), REQ_LAT_NS);
    }

    #[test]
    fn closure_is_a_cost_model() {
        let seek = |last: u64, start: u64, _len: u64| last.abs_diff(start);
        assert_eq!(seek.request_latency(100, 40, 8), 60);
    }
}
