// MITTCFQ ADMISSION CONTROLLER
// THE CALLING CONVENTION BETWEEN THE SCHEDULER AND THE CORE:
//   COMPLETION:  on_complete*() FEEDS THE OBSERVED LATENCY INTO THE HISTORY
//   ADMISSION:   decide() CONSULTS THE HISTORY, THEN (IF A BUDGET IS SET)
//                THE QUEUE LATENCY ESTIMATE
//
// DECISIONS ARE ADVISORY. THROTTLE / DEFER / REJECT IS THE CALLER'S JOB.
// NO LOCKS: RUNS UNDER WHATEVER EXCLUSION THE SCHEDULER HOLDS ON THE DEVICE.

use anyhow::Result;

use crate::cost::{ConstantCost, CostModel};
use crate::device::DeviceContext;
use crate::estimator::QueueLatencyEstimator;
use crate::history::{History, PredictionTrack};
use crate::timestamp::SlaTimestamp;
use crate::tuning::SlaParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Admit,
    RejectHistory,
    RejectPredicted { estimate_ns: u64 },
}

impl Decision {
    pub fn is_admit(self) -> bool {
        self == Decision::Admit
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Admit => "ADMIT",
            Self::RejectHistory => "REJECT_HISTORY",
            Self::RejectPredicted { .. } => "REJECT_PREDICTED",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdmissionStats {
    pub admitted: u64,
    pub rejected_history: u64,
    pub rejected_predicted: u64,
    pub completions: u64,
}

pub struct SlaController<C = ConstantCost> {
    history: History,
    estimator: QueueLatencyEstimator<C>,
    predictions: PredictionTrack,
    budget_ns: Option<u64>,
    stats: AdmissionStats,
}

impl SlaController<ConstantCost> {
    pub fn with_defaults(params: SlaParams) -> Result<Self> {
        Self::new(params, QueueLatencyEstimator::default())
    }
}

impl<C: CostModel> SlaController<C> {
    pub fn new(params: SlaParams, estimator: QueueLatencyEstimator<C>) -> Result<Self> {
        Ok(Self {
            history: History::new(params)?,
            estimator,
            predictions: PredictionTrack::new(params.capacity)?,
            budget_ns: None,
            stats: AdmissionStats::default(),
        })
    }

    pub fn with_budget(mut self, budget_ns: u64) -> Self {
        self.budget_ns = Some(budget_ns);
        self
    }

    pub fn set_budget(&mut self, budget_ns: Option<u64>) {
        self.budget_ns = budget_ns;
    }

    // RECONFIGURATION DISCARDS HISTORY AND PREDICTION ERROR ALIKE
    pub fn set_parameter(&mut self, latency_threshold: u64, slowcount_threshold: usize) {
        self.history.set_parameter(latency_threshold, slowcount_threshold);
        self.predictions.reset();
    }

    pub fn decide(&mut self, dev: &DeviceContext, candidate: u64) -> Decision {
        let decision = if !self.history.can_accept(candidate) {
            Decision::RejectHistory
        } else {
            match self.budget_ns {
                Some(budget) => {
                    let estimate_ns = self.estimator.estimate(dev);
                    if estimate_ns > budget {
                        Decision::RejectPredicted { estimate_ns }
                    } else {
                        Decision::Admit
                    }
                }
                None => Decision::Admit,
            }
        };

        match decision {
            Decision::Admit => self.stats.admitted += 1,
            Decision::RejectHistory => self.stats.rejected_history += 1,
            Decision::RejectPredicted { .. } => self.stats.rejected_predicted += 1,
        }
        decision
    }

    // ESTIMATE FOR A REQUEST ABOUT TO BE DISPATCHED. PAIR WITH on_complete_predicted().
    pub fn predict(&self, dev: &DeviceContext) -> u64 {
        self.estimator.estimate(dev)
    }

    pub fn on_complete(&mut self, ts: SlaTimestamp) -> u64 {
        let latency = ts.elapsed_ns();
        self.on_complete_ns(latency);
        latency
    }

    pub fn on_complete_ns(&mut self, latency_ns: u64) {
        self.history.accept(latency_ns);
        self.stats.completions += 1;
    }

    pub fn on_complete_predicted(&mut self, latency_ns: u64, predicted_ns: u64) {
        self.on_complete_ns(latency_ns);
        self.predictions.record(predicted_ns, latency_ns);
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn estimator(&self) -> &QueueLatencyEstimator<C> {
        &self.estimator
    }

    pub fn predictions(&self) -> &PredictionTrack {
        &self.predictions
    }

    pub fn stats(&self) -> AdmissionStats {
        self.stats
    }
}
