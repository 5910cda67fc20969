//! kubesim core types: cluster entities, narrated steps, and the closed
//! action set every mutation is funneled through.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

mod action;

pub use action::Action;

/// Logical locations packets travel between. These are stable identifiers
/// consumed by whatever renders the animation, not display names.
pub mod components {
    pub const API_SERVER: &str = "api-server";
    pub const ETCD: &str = "etcd";
    pub const SCHEDULER: &str = "scheduler";
    pub const CONTROLLER_MANAGER: &str = "controller-manager";
    pub const ETH0: &str = "eth0";
    pub const CNI0: &str = "cni0";
    pub const IPTABLES: &str = "iptables";

    pub fn kubelet(node_id: &str) -> String {
        format!("kubelet-{node_id}")
    }
    pub fn cri(node_id: &str) -> String {
        format!("cri-{node_id}")
    }
    pub fn cni_plugin(node_id: &str) -> String {
        format!("cni-{node_id}-plugin")
    }
    pub fn proxy(node_id: &str) -> String {
        format!("proxy-{node_id}")
    }
    pub fn pod(pod_id: &str) -> String {
        format!("pod-{pod_id}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PodStatus {
    Pending,
    ContainerCreating,
    Running,
    Terminating,
    Failed,
    Succeeded,
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodStatus::Pending => "Pending",
            PodStatus::ContainerCreating => "ContainerCreating",
            PodStatus::Running => "Running",
            PodStatus::Terminating => "Terminating",
            PodStatus::Failed => "Failed",
            PodStatus::Succeeded => "Succeeded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    Ready,
    NotReady,
}

/// Node-side exclusion marker. Taints are ephemeral demo data, generated
/// fresh per scheduling pass and never persisted on the node entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

/// Pod-side override permitting placement despite a matching taint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Toleration {
    pub key: String,
    pub value: String,
    pub effect: String,
}

impl Toleration {
    pub fn tolerates(&self, taint: &Taint) -> bool {
        self.key == taint.key && self.value == taint.value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub id: String,
    pub name: String,
    pub status: PodStatus,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub tolerations: SmallVec<[Toleration; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub status: NodeStatus,
    /// Back-references only; a pod's `node_id` is authoritative.
    #[serde(default)]
    pub pods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub port: u16,
    pub target_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

impl Service {
    /// The substring used to find "matching" pods. Real label-selector
    /// evaluation is out of scope; name-substring matching on the `app`
    /// selector value (service name as fallback) is a preserved
    /// simplification.
    pub fn match_fragment(&self) -> &str {
        self.selector
            .get("app")
            .map(String::as_str)
            .unwrap_or(self.name.as_str())
    }
}

/// Resolved service-to-pod network binding. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub service: String,
    pub pod_ip: String,
    pub node: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    pub replicas: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub status: String,
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkingState {
    /// Display-only rule strings, append-only, never parsed back.
    pub iptables_rules: Vec<String>,
    pub endpoints: Vec<Endpoint>,
    pub interfaces: FxHashMap<String, Interface>,
}

/// Transient animation entity; removed again once the consumer is done
/// rendering the hop. Carries no business meaning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    pub id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Info,
    Scheduler,
    Kubelet,
    Network,
    Controller,
    Pod,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Info => "INFO",
            EventKind::Scheduler => "SCHEDULER",
            EventKind::Kubelet => "KUBELET",
            EventKind::Network => "NETWORK",
            EventKind::Controller => "CONTROLLER",
            EventKind::Pod => "POD",
            EventKind::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Append-only activity-log entry. Unbounded by design for now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Event {
    pub fn now(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// One narrated unit of simulation progress: a human-readable description
/// plus the batch of actions applied atomically when the step executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub description: String,
    pub actions: Vec<Action>,
}

impl Step {
    pub fn new(description: impl Into<String>, actions: Vec<Action>) -> Self {
        Self { description: description.into(), actions }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedPhase {
    Filtering,
    Scoring,
    Binding,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredicateSet {
    pub pod_fits_resources: bool,
    pub no_disk_conflict: bool,
    pub pod_tolerates_node_taints: bool,
}

impl PredicateSet {
    pub fn all_pass(&self) -> bool {
        self.pod_fits_resources && self.no_disk_conflict && self.pod_tolerates_node_taints
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrioritySet {
    pub image_locality: i32,
    pub least_requested: i32,
}

/// Per-node detail shown while the scheduler window is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEvaluation {
    pub node_id: String,
    pub node_name: String,
    #[serde(default)]
    pub taints: SmallVec<[Taint; 2]>,
    pub predicates: Option<PredicateSet>,
    pub priorities: Option<PrioritySet>,
    pub score: Option<i32>,
}

/// Transient projection of the scheduler's pipeline, replaced wholesale on
/// every update. Visualization only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSnapshot {
    pub current_pod: Pod,
    pub nodes: Vec<NodeEvaluation>,
    pub phase: SchedPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiRequest {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerState {
    pub status: String,
    pub requests: Vec<ApiRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlane {
    pub api_server: ApiServerState,
    pub etcd_status: String,
    pub scheduler_status: String,
}

/// The whole cluster state value. Single writer: the store's dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterState {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub services: Vec<Service>,
    pub deployments: Vec<Deployment>,
    pub events: Vec<Event>,
    pub control_plane: ControlPlane,
    pub scheduler_internals: Option<SchedulerSnapshot>,
    pub packets: Vec<Packet>,
    pub networking: NetworkingState,
    pub step_queue: VecDeque<Step>,
    pub is_playing: bool,
    pub current_step_description: String,
    pub show_scheduler_window: bool,
    pub scheduler_deep_dive: bool,
}

impl ClusterState {
    pub fn pod(&self, id: &str) -> Option<&Pod> {
        self.pods.iter().find(|p| p.id == id)
    }

    pub fn first_running_pod(&self) -> Option<&Pod> {
        self.pods.iter().find(|p| p.status == PodStatus::Running)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown action kind: {0}")]
    UnknownAction(String),
    #[error("malformed action payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}
