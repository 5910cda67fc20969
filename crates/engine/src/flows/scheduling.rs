//! Scheduling flow: plans the narrated path of a Pending, unassigned pod
//! through persist, filter, score, and bind.

use tracing::debug;

use kubesim_core::{
    components, Action, ClusterState, Event, EventKind, Pod, PodStatus, SchedPhase,
    SchedulerSnapshot, Step,
};
use kubesim_sched::{evaluate, DemoDataSource, SchedulingOutcome};

use crate::guard::{sched_key, PlanGuard};

pub(crate) fn scan(
    state: &ClusterState,
    guard: &mut PlanGuard,
    demo: &mut dyn DemoDataSource,
) -> Vec<Vec<Step>> {
    let mut plans = Vec::new();
    for pod in &state.pods {
        if pod.status != PodStatus::Pending || pod.node_id.is_some() {
            continue;
        }
        if !guard.try_claim(sched_key(&pod.id)) {
            continue;
        }

        // Tolerations are demo data for this pass; they live on the
        // snapshot shown in the scheduler window, not on the stored pod.
        let mut pod = pod.clone();
        pod.tolerations = demo.pod_tolerations();
        let outcome = evaluate(&pod, &state.nodes, demo);
        debug!(pod = %pod.id, selected = ?outcome.selected, "scheduling plan generated");
        plans.push(plan(&pod, &outcome, state.nodes.len()));
    }
    plans
}

fn snapshot(pod: &Pod, outcome: &SchedulingOutcome, phase: SchedPhase) -> Action {
    let nodes = match phase {
        SchedPhase::Filtering => outcome.filtering_view(),
        _ => outcome.evaluations.clone(),
    };
    Action::UpdateSchedulerState(Some(SchedulerSnapshot {
        current_pod: pod.clone(),
        nodes,
        phase,
    }))
}

fn plan(pod: &Pod, outcome: &SchedulingOutcome, node_count: usize) -> Vec<Step> {
    use super::packet;
    let id = pod.id.as_str();

    let mut steps = vec![
        Step::new(
            "API Server receives the request and persists the Pod to etcd",
            vec![packet("sched1", id, components::API_SERVER, components::ETCD)],
        ),
        Step::new(
            "etcd confirms Pod creation to the API Server",
            vec![packet("sched2", id, components::ETCD, components::API_SERVER)],
        ),
        Step::new(
            "Scheduler watches the API Server and filters candidate nodes",
            vec![
                packet("sched3", id, components::API_SERVER, components::SCHEDULER),
                snapshot(pod, outcome, SchedPhase::Filtering),
                Action::SetShowSchedulerWindow(true),
            ],
        ),
        Step::new(
            "Scheduler scores the feasible nodes",
            vec![snapshot(pod, outcome, SchedPhase::Scoring)],
        ),
    ];

    match &outcome.selected {
        Some(node) => {
            steps.push(Step::new(
                format!("Scheduler selects {} for the Pod", node.name),
                vec![
                    snapshot(pod, outcome, SchedPhase::Binding),
                    Action::AddLog(Event::now(
                        EventKind::Scheduler,
                        format!("Scheduler: Selected {} for {}", node.name, pod.name),
                    )),
                ],
            ));
            steps.push(Step::new(
                "Scheduler sends binding info to the API Server",
                vec![
                    packet("sched4", id, components::SCHEDULER, components::API_SERVER),
                    Action::SetShowSchedulerWindow(false),
                ],
            ));
            steps.push(Step::new(
                "API Server updates etcd with the node assignment",
                vec![packet("sched5", id, components::API_SERVER, components::ETCD)],
            ));
            steps.push(Step::new(
                "etcd confirms the binding to the API Server",
                vec![
                    packet("sched6", id, components::ETCD, components::API_SERVER),
                    Action::AssignPodToNode {
                        pod_id: pod.id.clone(),
                        node_id: node.id.clone(),
                    },
                ],
            ));
        }
        None => {
            steps.push(Step::new(
                "Scheduling failed: no node passes the predicates",
                vec![
                    Action::AddLog(Event::now(
                        EventKind::Error,
                        format!("Scheduler: 0/{node_count} nodes available for {}", pod.name),
                    )),
                    Action::SetShowSchedulerWindow(false),
                ],
            ));
        }
    }

    steps
}
