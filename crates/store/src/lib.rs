//! kubesim store: the single state value plus the dispatch entry point.
//!
//! All mutation is funneled through [`ClusterStore::dispatch`]; nothing else
//! writes the state. Each recognized action transforms the state in place
//! and, where the action represents a cluster mutation, appends a matching
//! activity-log event. Stepper control, packets, and scheduler-snapshot
//! updates are silent.

#![forbid(unsafe_code)]

use metrics::counter;
use tracing::{debug, warn};

use kubesim_core::{
    components, Action, ApiRequest, ApiServerState, ClusterState, ControlPlane, Event, EventKind,
    Interface, NetworkingState, Node, NodeStatus, StoreError,
};

/// Seed state: a single ready worker node and the fixed interface map.
pub fn initial_state() -> ClusterState {
    let mut interfaces = rustc_hash::FxHashMap::default();
    interfaces.insert(
        components::ETH0.to_string(),
        Interface { status: "UP".into(), ip: "10.0.1.2".into() },
    );
    interfaces.insert(
        components::CNI0.to_string(),
        Interface { status: "UP".into(), ip: "172.16.0.1".into() },
    );

    ClusterState {
        nodes: vec![Node {
            id: "node-1".into(),
            name: "worker-node-1".into(),
            status: NodeStatus::Ready,
            pods: Vec::new(),
        }],
        pods: Vec::new(),
        services: Vec::new(),
        deployments: Vec::new(),
        events: Vec::new(),
        control_plane: ControlPlane {
            api_server: ApiServerState { status: "Healthy".into(), requests: Vec::new() },
            etcd_status: "Healthy".into(),
            scheduler_status: "Healthy".into(),
        },
        scheduler_internals: None,
        packets: Vec::new(),
        networking: NetworkingState { interfaces, ..Default::default() },
        step_queue: std::collections::VecDeque::new(),
        is_playing: false,
        current_step_description: "Ready".into(),
        show_scheduler_window: false,
        scheduler_deep_dive: false,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Reject unrecognized `{type, payload}` values at the JSON boundary
    /// instead of ignoring them.
    pub strict_actions: bool,
}

/// Owns the cluster state; the sole writer.
pub struct ClusterStore {
    state: ClusterState,
    opts: StoreOptions,
    epoch: u64,
}

impl ClusterStore {
    pub fn new(opts: StoreOptions) -> Self {
        Self { state: initial_state(), opts, epoch: 0 }
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    /// Monotonic count of recognized dispatches; unknown JSON kinds do not
    /// advance it.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!(kind = action.kind(), "dispatch");
        counter!("kubesim_actions_total", 1);
        reduce(&mut self.state, action);
        self.epoch += 1;
    }

    /// External `{type, payload}` boundary. Unrecognized kinds and
    /// malformed payloads are ignored with a warning by default; strict
    /// mode surfaces them as errors.
    pub fn dispatch_json(&mut self, value: serde_json::Value) -> Result<(), StoreError> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("<missing type>")
            .to_string();
        if !Action::KINDS.contains(&kind.as_str()) {
            if self.opts.strict_actions {
                return Err(StoreError::UnknownAction(kind));
            }
            warn!(kind = %kind, "ignoring unrecognized action");
            return Ok(());
        }
        match serde_json::from_value::<Action>(value) {
            Ok(action) => {
                self.dispatch(action);
                Ok(())
            }
            Err(err) => {
                if self.opts.strict_actions {
                    return Err(StoreError::MalformedPayload(err));
                }
                warn!(kind = %kind, error = %err, "ignoring action with malformed payload");
                Ok(())
            }
        }
    }
}

fn log(state: &mut ClusterState, kind: EventKind, message: String) {
    state.events.push(Event::now(kind, message));
}

fn reduce(state: &mut ClusterState, action: Action) {
    match action {
        // --- Stepper control (silent) ---
        Action::EnqueueSteps(steps) => {
            state.step_queue.extend(steps);
        }
        Action::ExecuteNextStep => {
            if let Some(step) = state.step_queue.pop_front() {
                state.current_step_description = step.description;
            }
        }
        Action::SetPlaying(playing) => {
            state.is_playing = playing;
        }
        Action::ClearQueue => {
            state.step_queue.clear();
            state.current_step_description = "Ready".into();
        }
        Action::SetShowSchedulerWindow(show) => {
            state.show_scheduler_window = show;
        }
        Action::SetSchedulerDeepDiveMode(on) => {
            state.scheduler_deep_dive = on;
        }

        // --- Cluster mutations ---
        Action::AddPod(pod) => {
            log(state, EventKind::Info, format!("Pod {} created", pod.name));
            state.pods.push(pod);
        }
        Action::UpdatePodStatus { id, status, ip } => {
            if let Some(pod) = state.pods.iter_mut().find(|p| p.id == id) {
                pod.status = status;
                if let Some(ip) = ip {
                    pod.ip = Some(ip);
                }
            }
            log(state, EventKind::Info, format!("Pod {id} is now {status}"));
        }
        Action::AssignPodToNode { pod_id, node_id } => {
            if let Some(pod) = state.pods.iter_mut().find(|p| p.id == pod_id) {
                pod.node_id = Some(node_id.clone());
            }
            if let Some(node) = state.nodes.iter_mut().find(|n| n.id == node_id) {
                node.pods.push(pod_id.clone());
            }
            log(state, EventKind::Scheduler, format!("Assigned {pod_id} to {node_id}"));
        }
        Action::DeletePod(id) => {
            state.pods.retain(|p| p.id != id);
            state.nodes.iter_mut().for_each(|n| n.pods.retain(|p| *p != id));
            log(state, EventKind::Info, format!("Pod {id} deleted"));
        }
        Action::AddService(service) => {
            log(state, EventKind::Info, format!("Service {} created", service.name));
            state.services.push(service);
        }
        Action::UpdateDeploymentScale { name, replicas } => {
            if let Some(dep) = state.deployments.iter_mut().find(|d| d.name == name) {
                dep.replicas = replicas;
                log(state, EventKind::Info, format!("Deployment {name} scaled to {replicas}"));
            } else {
                state.deployments.push(kubesim_core::Deployment {
                    name: name.clone(),
                    replicas,
                });
                log(
                    state,
                    EventKind::Info,
                    format!("Deployment {name} created with {replicas} replicas"),
                );
            }
        }

        // --- Networking ---
        Action::AddIptablesRule(rule) => {
            log(state, EventKind::Network, format!("Iptables: Added rule {rule}"));
            state.networking.iptables_rules.push(rule);
        }
        Action::AddEndpoint(endpoint) => {
            log(
                state,
                EventKind::Network,
                format!("Endpoints: Added {} for {}", endpoint.pod_ip, endpoint.service),
            );
            state.networking.endpoints.push(endpoint);
        }
        Action::StartCurl { url } => {
            let id = format!("req-{}", uuid::Uuid::new_v4());
            state.control_plane.api_server.requests.push(ApiRequest { id, url });
        }

        // --- Observability surface ---
        Action::AddLog(event) => {
            state.events.push(event);
        }
        Action::AddPacket(packet) => {
            state.packets.push(packet);
        }
        Action::RemovePacket(id) => {
            state.packets.retain(|p| p.id != id);
        }
        Action::UpdateSchedulerState(snapshot) => {
            state.scheduler_internals = snapshot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubesim_core::{Endpoint, Packet, Pod, PodStatus, Step};

    fn pod(id: &str, name: &str) -> Pod {
        Pod {
            id: id.into(),
            name: name.into(),
            status: PodStatus::Pending,
            node_id: None,
            ip: None,
            tolerations: Default::default(),
        }
    }

    #[test]
    fn seeded_state_has_one_ready_node() {
        let s = initial_state();
        assert_eq!(s.nodes.len(), 1);
        assert_eq!(s.nodes[0].id, "node-1");
        assert_eq!(s.nodes[0].name, "worker-node-1");
        assert_eq!(s.current_step_description, "Ready");
        assert!(!s.is_playing);
        assert!(s.networking.interfaces.contains_key("eth0"));
        assert!(s.networking.interfaces.contains_key("cni0"));
    }

    #[test]
    fn add_pod_appends_event() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::AddPod(pod("p1", "nginx-1")));
        assert_eq!(store.state().pods.len(), 1);
        let ev = store.state().events.last().unwrap();
        assert_eq!(ev.kind, EventKind::Info);
        assert_eq!(ev.message, "Pod nginx-1 created");
    }

    #[test]
    fn assign_pod_sets_both_sides() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::AddPod(pod("p1", "nginx-1")));
        store.dispatch(Action::AssignPodToNode { pod_id: "p1".into(), node_id: "node-1".into() });
        assert_eq!(store.state().pod("p1").unwrap().node_id.as_deref(), Some("node-1"));
        assert_eq!(store.state().nodes[0].pods, vec!["p1".to_string()]);
        let ev = store.state().events.last().unwrap();
        assert_eq!(ev.kind, EventKind::Scheduler);
        assert_eq!(ev.message, "Assigned p1 to node-1");
    }

    #[test]
    fn update_pod_status_keeps_ip_when_absent() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::AddPod(pod("p1", "nginx-1")));
        store.dispatch(Action::UpdatePodStatus {
            id: "p1".into(),
            status: PodStatus::Running,
            ip: Some("172.16.0.42".into()),
        });
        store.dispatch(Action::UpdatePodStatus {
            id: "p1".into(),
            status: PodStatus::Terminating,
            ip: None,
        });
        let p = store.state().pod("p1").unwrap();
        assert_eq!(p.status, PodStatus::Terminating);
        assert_eq!(p.ip.as_deref(), Some("172.16.0.42"));
    }

    #[test]
    fn deployment_scale_upserts_by_name() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::UpdateDeploymentScale { name: "myapp".into(), replicas: 5 });
        store.dispatch(Action::UpdateDeploymentScale { name: "myapp".into(), replicas: 2 });
        assert_eq!(store.state().deployments.len(), 1);
        assert_eq!(store.state().deployments[0].replicas, 2);
        assert_eq!(
            store.state().events.last().unwrap().message,
            "Deployment myapp scaled to 2"
        );
    }

    #[test]
    fn step_queue_is_fifo() {
        let mut store = ClusterStore::new(StoreOptions::default());
        let b1: Vec<Step> =
            (0..3).map(|i| Step::new(format!("b1-{i}"), vec![])).collect();
        let b2: Vec<Step> =
            (0..2).map(|i| Step::new(format!("b2-{i}"), vec![])).collect();
        store.dispatch(Action::EnqueueSteps(b1));
        store.dispatch(Action::EnqueueSteps(b2));

        let mut seen = Vec::new();
        while !store.state().step_queue.is_empty() {
            store.dispatch(Action::ExecuteNextStep);
            seen.push(store.state().current_step_description.clone());
        }
        assert_eq!(seen, vec!["b1-0", "b1-1", "b1-2", "b2-0", "b2-1"]);
    }

    #[test]
    fn execute_next_step_on_empty_queue_is_noop() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::ExecuteNextStep);
        assert_eq!(store.state().current_step_description, "Ready");
    }

    #[test]
    fn packets_are_silent_and_removable() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::AddPacket(Packet {
            id: "p1".into(),
            from: "api-server".into(),
            to: "etcd".into(),
        }));
        assert!(store.state().events.is_empty());
        store.dispatch(Action::RemovePacket("p1".into()));
        assert!(store.state().packets.is_empty());
    }

    #[test]
    fn endpoint_event_mentions_ip_and_service() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::AddEndpoint(Endpoint {
            service: "nginx-svc".into(),
            pod_ip: "172.16.0.12".into(),
            node: "node-1".into(),
        }));
        assert_eq!(
            store.state().events.last().unwrap().message,
            "Endpoints: Added 172.16.0.12 for nginx-svc"
        );
    }

    #[test]
    fn delete_pod_removes_both_sides() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch(Action::AddPod(pod("p1", "nginx-1")));
        store.dispatch(Action::AssignPodToNode { pod_id: "p1".into(), node_id: "node-1".into() });
        store.dispatch(Action::DeletePod("p1".into()));
        assert!(store.state().pods.is_empty());
        assert!(store.state().nodes[0].pods.is_empty());
        assert_eq!(store.state().events.last().unwrap().message, "Pod p1 deleted");
    }

    #[test]
    fn malformed_payload_is_ignored_unless_strict() {
        let bad = serde_json::json!({ "type": "ADD_POD", "payload": { "id": 7 } });

        let mut store = ClusterStore::new(StoreOptions::default());
        store.dispatch_json(bad.clone()).unwrap();
        assert!(store.state().pods.is_empty());

        let mut strict = ClusterStore::new(StoreOptions { strict_actions: true });
        let err = strict.dispatch_json(bad).unwrap_err();
        assert!(matches!(err, StoreError::MalformedPayload(_)));
    }

    #[test]
    fn unknown_kind_is_ignored_by_default() {
        let mut store = ClusterStore::new(StoreOptions::default());
        let before = store.epoch();
        store
            .dispatch_json(serde_json::json!({ "type": "START_INGRESS_SIMULATION" }))
            .unwrap();
        assert_eq!(store.epoch(), before);
    }

    #[test]
    fn unknown_kind_errors_in_strict_mode() {
        let mut store = ClusterStore::new(StoreOptions { strict_actions: true });
        let err = store
            .dispatch_json(serde_json::json!({ "type": "ADD_VETH", "payload": "veth0" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownAction(k) if k == "ADD_VETH"));
    }

    #[test]
    fn json_boundary_accepts_wire_payloads() {
        let mut store = ClusterStore::new(StoreOptions::default());
        store
            .dispatch_json(serde_json::json!({
                "type": "ADD_POD",
                "payload": { "id": "p1", "name": "nginx-1", "status": "Pending" }
            }))
            .unwrap();
        store
            .dispatch_json(serde_json::json!({
                "type": "START_CURL",
                "payload": { "url": "10.96.0.10" }
            }))
            .unwrap();
        assert_eq!(store.state().pods.len(), 1);
        assert_eq!(store.state().control_plane.api_server.requests.len(), 1);
    }
}
