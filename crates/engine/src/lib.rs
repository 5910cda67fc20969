//! kubesim engine: reactive flow generators over the cluster state and the
//! sequential step executor.
//!
//! Control flow: an external intent is dispatched, the engine re-scans the
//! four flows against the new snapshot, qualifying entities get their full
//! narrated plan enqueued as one batch, and the executor (autoplay tick or
//! manual advance) pops one step at a time, applying its actions in order
//! before re-scanning again. Everything runs on the caller's thread; the
//! store is the only shared value and the engine its only writer.

#![forbid(unsafe_code)]

use metrics::counter;
use tracing::{debug, info};

use kubesim_core::{Action, ClusterState, StoreError};
use kubesim_sched::DemoDataSource;
use kubesim_store::{ClusterStore, StoreOptions};

mod flows;
mod guard;

use guard::PlanGuard;

/// Autoplay period used by the default presentation.
pub const DEFAULT_STEP_INTERVAL_MS: u64 = 2500;

pub struct SimulationEngine {
    store: ClusterStore,
    guard: PlanGuard,
    demo: Box<dyn DemoDataSource>,
}

impl SimulationEngine {
    pub fn new(opts: StoreOptions, demo: Box<dyn DemoDataSource>) -> Self {
        Self { store: ClusterStore::new(opts), guard: PlanGuard::new(), demo }
    }

    /// Read-only snapshot of the current state.
    pub fn state(&self) -> &ClusterState {
        self.store.state()
    }

    /// Dispatch an external intent and re-scan the flows.
    pub fn dispatch(&mut self, action: Action) {
        self.store.dispatch(action);
        self.react();
    }

    /// External `{type, payload}` boundary; see the store for the
    /// unknown-kind policy.
    pub fn dispatch_json(&mut self, value: serde_json::Value) -> Result<(), StoreError> {
        self.store.dispatch_json(value)?;
        self.react();
        Ok(())
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.dispatch(Action::SetPlaying(playing));
    }

    /// Autoplay driver: advances one step, only while playing.
    pub fn tick(&mut self) -> Option<String> {
        if !self.state().is_playing {
            return None;
        }
        self.advance_step()
    }

    /// Manual driver: advances one step, only while paused.
    pub fn step(&mut self) -> Option<String> {
        if self.state().is_playing {
            return None;
        }
        self.advance_step()
    }

    /// The single pop-and-apply routine both drivers funnel through.
    /// Applies every action of the head step in order, consumes the step,
    /// then re-scans the flows. Returns the consumed step's description.
    fn advance_step(&mut self) -> Option<String> {
        let step = self.state().step_queue.front().cloned()?;
        for action in step.actions {
            self.store.dispatch(action);
        }
        self.store.dispatch(Action::ExecuteNextStep);
        counter!("kubesim_steps_executed_total", 1);
        info!(description = %step.description, remaining = self.state().step_queue.len(), "step executed");
        self.react();
        Some(step.description)
    }

    /// One level-triggered pass over all four flows.
    fn react(&mut self) {
        let mut plans = Vec::new();
        plans.extend(flows::scheduling::scan(self.store.state(), &mut self.guard, self.demo.as_mut()));
        plans.extend(flows::kubelet::scan(self.store.state(), &mut self.guard, self.demo.as_mut()));
        plans.extend(flows::service::scan(self.store.state(), &mut self.guard));
        plans.extend(flows::curl::scan(self.store.state(), &mut self.guard));

        for steps in plans {
            debug!(steps = steps.len(), "enqueueing plan");
            counter!("kubesim_plans_enqueued_total", 1);
            self.store.dispatch(Action::EnqueueSteps(steps));
        }
    }
}
