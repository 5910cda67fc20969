//! Per-entity plan guard.
//!
//! A key is claimed when a flow enqueues the plan for an entity's next
//! transition and stays claimed for as long as the entity could still
//! qualify, so re-scanning unchanged state never produces a duplicate plan.

use rustc_hash::FxHashSet;

#[derive(Default)]
pub struct PlanGuard {
    planned: FxHashSet<String>,
}

impl PlanGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key`; returns false if it was already claimed.
    pub fn try_claim(&mut self, key: String) -> bool {
        self.planned.insert(key)
    }

    #[cfg(test)]
    pub fn is_claimed(&self, key: &str) -> bool {
        self.planned.contains(key)
    }
}

pub fn sched_key(pod_id: &str) -> String {
    format!("sched/{pod_id}")
}

pub fn kubelet_key(pod_id: &str) -> String {
    format!("kubelet/{pod_id}")
}

pub fn service_key(service_id: &str) -> String {
    format!("svc/{service_id}")
}

pub fn curl_key(request_id: &str) -> String {
    format!("curl/{request_id}")
}
