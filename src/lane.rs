// MITTCFQ GATED LANE
// ONE STEP OF THE DEVICE LOOP THE WAY A SCHEDULER DRIVES THE CORE:
//   FOREGROUND:  ALWAYS DISPATCHED, ALWAYS COMPLETED, ALWAYS FED TO THE HISTORY
//   BACKGROUND:  ENQUEUED BEHIND THE IN-FLIGHT FOREGROUND READ, THEN GATED
//
// THE GATE ONLY EVER HOLDS BACK ADDITIONAL WORK. FOREGROUND COMPLETIONS KEEP
// MOVING THE WINDOW, SO A GATE THAT CLOSED AT THE QUOTA REOPENS ONCE THE SLOW
// SAMPLES AGE OUT.
//
// THE I/O ITSELF IS A CALLBACK RETURNING THE OBSERVED LATENCY IN NS. THE BINARY
// TIMES A DIRECT READ; TESTS RETURN SCRIPTED LATENCIES.

use anyhow::Result;

use crate::admission::{Decision, SlaController};
use crate::cost::{ConstantCost, CostModel};
use crate::device::{DeviceContext, PendingRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub latency_ns: u64,
    pub predicted_ns: u64,
    pub background: Option<Decision>,
    pub background_ns: Option<u64>,
}

pub struct GateLane<C = ConstantCost> {
    ctl: SlaController<C>,
    ctx: DeviceContext,
    last_latency: u64,
}

impl<C: CostModel> GateLane<C> {
    pub fn new(ctl: SlaController<C>) -> Self {
        Self {
            ctl,
            ctx: DeviceContext::new(),
            last_latency: 0,
        }
    }

    pub fn step<F>(
        &mut self,
        fg: PendingRequest,
        bg: Option<PendingRequest>,
        mut io: F,
    ) -> Result<StepOutcome>
    where
        F: FnMut(&PendingRequest) -> Result<u64>,
    {
        // FOREGROUND GOES IN FLIGHT FIRST. THE ESTIMATE IS TAKEN WHILE IT WAITS.
        let fg_key = self.ctx.enqueue(fg);
        let predicted_ns = self.ctl.predict(&self.ctx);
        self.ctx.queue.remove(&fg_key);
        self.ctx.driver.dispatch(fg);

        // CANDIDATE IS VISIBLE TO THE ESTIMATOR WHILE IT IS DECIDED
        let background = bg.map(|rq| {
            let key = self.ctx.enqueue(rq);
            let decision = self.ctl.decide(&self.ctx, self.last_latency);
            self.ctx.queue.remove(&key);
            if decision.is_admit() {
                self.ctx.driver.dispatch(rq);
            }
            (rq, decision)
        });

        let fg_result = io(&fg);
        self.ctx.complete(fg.pos);

        let bg_result = match background {
            Some((rq, decision)) if decision.is_admit() => {
                let r = io(&rq);
                self.ctx.complete(rq.pos);
                Some(r)
            }
            _ => None,
        };

        // DRIVER LIST IS EMPTY AGAIN BEFORE ANY ERROR LEAVES
        let latency_ns = fg_result?;
        self.ctl.on_complete_predicted(latency_ns, predicted_ns);
        self.last_latency = latency_ns;

        Ok(StepOutcome {
            latency_ns,
            predicted_ns,
            background: background.map(|(_, d)| d),
            background_ns: bg_result.transpose()?,
        })
    }

    pub fn controller(&self) -> &SlaController<C> {
        &self.ctl
    }

    pub fn controller_mut(&mut self) -> &mut SlaController<C> {
        &mut self.ctl
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }
}
