//! Sequencing state of the delivery loop.
//!
//! Mutated only by the loop of the run that owns it (`run_id`); read by the
//! control surface for status reporting.

use std::sync::Arc;

use uuid::Uuid;

use convoy_types::plan::DeliveryPlan;
use convoy_types::status::LoopPhase;

#[derive(Debug, Default)]
pub struct DeliveryState {
    pub running: bool,
    pub phase: LoopPhase,
    /// Identity of the run allowed to mutate this state.
    pub run_id: Option<Uuid>,
    pub plan: Option<Arc<DeliveryPlan>>,
    /// Template to deliver next. Always `<= templates.len()`.
    pub current_index: usize,
    /// Completed passes over the whole template sequence.
    pub loop_count: u64,
    pub total_sent: u64,
    pub failed_ticks: u64,
}

impl DeliveryState {
    /// Reset counters and hand ownership to a new run.
    pub fn begin(&mut self, run_id: Uuid, plan: Arc<DeliveryPlan>) {
        *self = Self {
            running: true,
            phase: LoopPhase::Starting,
            run_id: Some(run_id),
            plan: Some(plan),
            ..Self::default()
        };
    }

    pub fn owned_by(&self, run_id: Uuid) -> bool {
        self.run_id == Some(run_id)
    }

    fn template_count(&self) -> usize {
        self.plan.as_ref().map_or(0, |p| p.templates.len())
    }

    /// Wrap to the first template if the sequence is exhausted.
    ///
    /// Returns the new loop count when a wrap happened.
    pub fn wrap_if_exhausted(&mut self) -> Option<u64> {
        let len = self.template_count();
        if len == 0 || self.current_index < len {
            return None;
        }
        self.current_index = 0;
        self.loop_count += 1;
        Some(self.loop_count)
    }

    /// Record a delivered template and move to the next one.
    pub fn advance(&mut self) -> Option<u64> {
        self.total_sent += 1;
        self.current_index += 1;
        self.wrap_if_exhausted()
    }

    /// Record a tick on which every session failed. The index stays put.
    pub fn record_failed_tick(&mut self) {
        self.failed_ticks += 1;
    }
}
