//! The closed set of state-mutating actions. Wire form is `{type, payload}`
//! with SCREAMING_SNAKE_CASE type tags.

use serde::{Deserialize, Serialize};

use crate::{Endpoint, Event, Packet, Pod, PodStatus, SchedulerSnapshot, Service, Step};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    // Stepper control
    EnqueueSteps(Vec<Step>),
    ExecuteNextStep,
    SetPlaying(bool),
    ClearQueue,
    SetShowSchedulerWindow(bool),
    SetSchedulerDeepDiveMode(bool),

    // Cluster mutations
    AddPod(Pod),
    #[serde(rename_all = "camelCase")]
    UpdatePodStatus {
        id: String,
        status: PodStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ip: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AssignPodToNode { pod_id: String, node_id: String },
    DeletePod(String),
    AddService(Service),
    #[serde(rename_all = "camelCase")]
    UpdateDeploymentScale { name: String, replicas: u32 },

    // Networking
    AddIptablesRule(String),
    AddEndpoint(Endpoint),
    StartCurl { url: String },

    // Observability surface
    AddLog(Event),
    AddPacket(Packet),
    RemovePacket(String),
    UpdateSchedulerState(Option<SchedulerSnapshot>),
}

impl Action {
    /// Every recognized wire tag; anything else is outside the closed set.
    pub const KINDS: [&'static str; 19] = [
        "ENQUEUE_STEPS",
        "EXECUTE_NEXT_STEP",
        "SET_PLAYING",
        "CLEAR_QUEUE",
        "SET_SHOW_SCHEDULER_WINDOW",
        "SET_SCHEDULER_DEEP_DIVE_MODE",
        "ADD_POD",
        "UPDATE_POD_STATUS",
        "ASSIGN_POD_TO_NODE",
        "DELETE_POD",
        "ADD_SERVICE",
        "UPDATE_DEPLOYMENT_SCALE",
        "ADD_IPTABLES_RULE",
        "ADD_ENDPOINT",
        "START_CURL",
        "ADD_LOG",
        "ADD_PACKET",
        "REMOVE_PACKET",
        "UPDATE_SCHEDULER_STATE",
    ];

    /// Stable wire tag, used for logging and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::EnqueueSteps(_) => "ENQUEUE_STEPS",
            Action::ExecuteNextStep => "EXECUTE_NEXT_STEP",
            Action::SetPlaying(_) => "SET_PLAYING",
            Action::ClearQueue => "CLEAR_QUEUE",
            Action::SetShowSchedulerWindow(_) => "SET_SHOW_SCHEDULER_WINDOW",
            Action::SetSchedulerDeepDiveMode(_) => "SET_SCHEDULER_DEEP_DIVE_MODE",
            Action::AddPod(_) => "ADD_POD",
            Action::UpdatePodStatus { .. } => "UPDATE_POD_STATUS",
            Action::AssignPodToNode { .. } => "ASSIGN_POD_TO_NODE",
            Action::DeletePod(_) => "DELETE_POD",
            Action::AddService(_) => "ADD_SERVICE",
            Action::UpdateDeploymentScale { .. } => "UPDATE_DEPLOYMENT_SCALE",
            Action::AddIptablesRule(_) => "ADD_IPTABLES_RULE",
            Action::AddEndpoint(_) => "ADD_ENDPOINT",
            Action::StartCurl { .. } => "START_CURL",
            Action::AddLog(_) => "ADD_LOG",
            Action::AddPacket(_) => "ADD_PACKET",
            Action::RemovePacket(_) => "REMOVE_PACKET",
            Action::UpdateSchedulerState(_) => "UPDATE_SCHEDULER_STATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_table_covers_every_variant() {
        for a in [
            Action::ExecuteNextStep,
            Action::ClearQueue,
            Action::DeletePod("p1".into()),
            Action::UpdateSchedulerState(None),
        ] {
            assert!(Action::KINDS.contains(&a.kind()));
        }
        assert!(!Action::KINDS.contains(&"ADD_VETH"));
    }

    #[test]
    fn wire_tags_match_kind() {
        let actions = vec![
            Action::ExecuteNextStep,
            Action::SetPlaying(true),
            Action::ClearQueue,
            Action::AddIptablesRule("PREROUTING: 10.96.0.10:80 -> DNAT".into()),
            Action::RemovePacket("p1".into()),
            Action::StartCurl { url: "10.96.0.10".into() },
            Action::UpdateDeploymentScale { name: "myapp".into(), replicas: 3 },
        ];
        for a in actions {
            let v = serde_json::to_value(&a).unwrap();
            assert_eq!(v["type"], a.kind(), "tag mismatch for {a:?}");
        }
    }

    #[test]
    fn assign_pod_payload_is_camel_case() {
        let a = Action::AssignPodToNode { pod_id: "p1".into(), node_id: "node-1".into() };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["payload"]["podId"], "p1");
        assert_eq!(v["payload"]["nodeId"], "node-1");
    }

    #[test]
    fn update_pod_status_omits_missing_ip() {
        let a = Action::UpdatePodStatus { id: "p1".into(), status: PodStatus::Running, ip: None };
        let v = serde_json::to_value(&a).unwrap();
        assert!(v["payload"].get("ip").is_none());
        let back: Action = serde_json::from_value(v).unwrap();
        match back {
            Action::UpdatePodStatus { ip, .. } => assert!(ip.is_none()),
            other => panic!("unexpected action {other:?}"),
        }
    }
}
