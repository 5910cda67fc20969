//! Curl flow: a fixed packet-hop narrative for the most recent request,
//! ending at a Running pod or in a no-endpoints error.

use tracing::debug;

use kubesim_core::{components, Action, ClusterState, Event, EventKind, Step};

use crate::guard::{curl_key, PlanGuard};

/// DNAT target shown when no pod is Running yet.
const FALLBACK_POD_IP: &str = "172.16.0.5";

pub(crate) fn scan(state: &ClusterState, guard: &mut PlanGuard) -> Vec<Vec<Step>> {
    let request = match state.control_plane.api_server.requests.last() {
        Some(request) => request,
        None => return Vec::new(),
    };
    if !guard.try_claim(curl_key(&request.id)) {
        return Vec::new();
    }

    let running = state.first_running_pod();
    debug!(request = %request.id, url = %request.url, has_backend = running.is_some(), "curl plan generated");

    use super::packet;
    let id = request.id.as_str();
    let dnat_target = running
        .and_then(|p| p.ip.as_deref())
        .unwrap_or(FALLBACK_POD_IP);

    let mut steps = vec![
        Step::new(
            format!("Client sends a request to the Service IP ({})", request.url),
            vec![packet("req1", id, components::API_SERVER, components::ETH0)],
        ),
        Step::new(
            "Packet enters eth0 and hits the iptables PREROUTING chain",
            vec![packet("req2", id, components::ETH0, components::IPTABLES)],
        ),
        Step::new(
            "iptables DNATs the packet to the Pod IP",
            vec![Action::AddLog(Event::now(
                EventKind::Network,
                format!("Iptables: DNAT {} -> {}", request.url, dnat_target),
            ))],
        ),
        Step::new(
            "Packet is routed to the cni0 bridge",
            vec![packet("req3", id, components::IPTABLES, components::CNI0)],
        ),
    ];

    match running {
        Some(pod) => {
            steps.push(Step::new(
                "Bridge forwards the packet to the Pod via its veth pair",
                vec![packet("req4", id, components::CNI0, components::pod(&pod.id))],
            ));
            steps.push(Step::new(
                "Pod processes the request and responds",
                vec![Action::AddLog(Event::now(
                    EventKind::Pod,
                    format!("Pod {}: 200 OK", pod.name),
                ))],
            ));
        }
        None => {
            steps.push(Step::new(
                "Network error: no endpoints found",
                vec![Action::AddLog(Event::now(
                    EventKind::Error,
                    "Network: No endpoints found",
                ))],
            ));
        }
    }

    vec![steps]
}
