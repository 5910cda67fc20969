//! Kubelet flow: picks up pods that are scheduled but not yet started and
//! plans image pull, network setup, and container start.

use tracing::debug;

use kubesim_core::{components, Action, ClusterState, Event, EventKind, PodStatus, Step};
use kubesim_sched::DemoDataSource;

use crate::guard::{kubelet_key, PlanGuard};

pub(crate) fn scan(
    state: &ClusterState,
    guard: &mut PlanGuard,
    demo: &mut dyn DemoDataSource,
) -> Vec<Vec<Step>> {
    let mut plans = Vec::new();
    for pod in &state.pods {
        let node_id = match (&pod.status, &pod.node_id) {
            (PodStatus::Pending, Some(node_id)) => node_id.as_str(),
            _ => continue,
        };
        if !guard.try_claim(kubelet_key(&pod.id)) {
            continue;
        }

        let ip = demo.pod_ip();
        debug!(pod = %pod.id, node = node_id, ip = %ip, "kubelet plan generated");

        use super::packet;
        let id = pod.id.as_str();
        let kubelet = components::kubelet(node_id);
        let cri = components::cri(node_id);
        let cni = components::cni_plugin(node_id);

        plans.push(vec![
            Step::new(
                "Kubelet watches the API Server and sees the assigned Pod",
                vec![packet("kb1", id, components::API_SERVER, kubelet.clone())],
            ),
            Step::new(
                "Kubelet instructs the container runtime to pull the image",
                vec![
                    packet("kb2", id, kubelet.clone(), cri.clone()),
                    Action::UpdatePodStatus {
                        id: pod.id.clone(),
                        status: PodStatus::ContainerCreating,
                        ip: None,
                    },
                    Action::AddLog(Event::now(
                        EventKind::Kubelet,
                        format!("Kubelet: Pulling image for {}...", pod.name),
                    )),
                ],
            ),
            Step::new(
                "Container runtime reports the image pulled successfully",
                vec![packet("kb3", id, cri, kubelet.clone())],
            ),
            Step::new(
                "Kubelet asks the CNI plugin to set up networking",
                vec![packet("kb4", id, kubelet.clone(), cni.clone())],
            ),
            Step::new(
                "CNI allocates an IP and attaches the veth pair to cni0",
                vec![
                    packet("kb5", id, cni, kubelet.clone()),
                    Action::AddLog(Event::now(
                        EventKind::Network,
                        format!("CNI: Allocated IP {ip} to {}", pod.name),
                    )),
                ],
            ),
            Step::new(
                "Kubelet starts the container and updates the Pod status",
                vec![
                    Action::UpdatePodStatus {
                        id: pod.id.clone(),
                        status: PodStatus::Running,
                        ip: Some(ip),
                    },
                    Action::AddLog(Event::now(
                        EventKind::Kubelet,
                        format!("Kubelet: Container started for {}", pod.name),
                    )),
                ],
            ),
            Step::new(
                "Kubelet reports 'Running' back to the API Server",
                vec![packet("kb6", id, kubelet, components::API_SERVER)],
            ),
        ]);
    }
    plans
}
