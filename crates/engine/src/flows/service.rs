//! Service flow: endpoint discovery and the kube-proxy iptables write for
//! the most recently added service.

use tracing::debug;

use kubesim_core::{components, Action, ClusterState, Endpoint, Event, EventKind, PodStatus, Step};

use crate::guard::{service_key, PlanGuard};

pub(crate) fn scan(state: &ClusterState, guard: &mut PlanGuard) -> Vec<Vec<Step>> {
    let service = match state.services.last() {
        Some(service) => service,
        None => return Vec::new(),
    };
    if !guard.try_claim(service_key(&service.id)) {
        return Vec::new();
    }

    let node_id = state.nodes.first().map(|n| n.id.as_str()).unwrap_or("node-1");
    let proxy = components::proxy(node_id);
    let fragment = service.match_fragment();
    // Name-substring match stands in for label-selector evaluation.
    let matching: Vec<_> = state
        .pods
        .iter()
        .filter(|p| p.status == PodStatus::Running && p.name.contains(fragment))
        .collect();
    debug!(service = %service.id, matched = matching.len(), "service plan generated");

    use super::packet;
    let id = service.id.as_str();

    let mut endpoint_actions: Vec<Action> = matching
        .iter()
        .filter_map(|pod| {
            pod.ip.as_ref().map(|ip| {
                Action::AddEndpoint(Endpoint {
                    service: service.name.clone(),
                    pod_ip: ip.clone(),
                    node: node_id.to_string(),
                })
            })
        })
        .collect();
    endpoint_actions.push(packet("svc2", id, components::CONTROLLER_MANAGER, components::API_SERVER));

    vec![vec![
        Step::new(
            "API Server persists the Service to etcd",
            vec![packet("svc1", id, components::API_SERVER, components::ETCD)],
        ),
        Step::new(
            "Endpoint controller detects the Service and finds matching Pods",
            vec![Action::AddLog(Event::now(
                EventKind::Controller,
                format!("Endpoints: Found {} pods for {}", matching.len(), service.name),
            ))],
        ),
        Step::new("Endpoint controller creates the Endpoints object", endpoint_actions),
        Step::new(
            "Kube-proxy watches the API Server for Service and Endpoint updates",
            vec![packet("svc3", id, components::API_SERVER, proxy.clone())],
        ),
        Step::new(
            "Kube-proxy writes the DNAT iptables rule on the worker node",
            vec![
                Action::AddIptablesRule(format!("PREROUTING: {}:80 -> DNAT", service.cluster_ip)),
                packet("svc4", id, proxy, components::IPTABLES),
            ],
        ),
    ]]
}
