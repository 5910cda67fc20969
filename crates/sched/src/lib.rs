//! kubesim scheduler: a best-effort in-memory pipeline of predicate
//! filtering and priority scoring over the demo cluster.
//!
//! Taints, tolerations, and priority scores are demo data drawn from a
//! [`DemoDataSource`] so the randomized default can be swapped for a
//! scripted source in tests.

#![forbid(unsafe_code)]

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use kubesim_core::{Node, NodeEvaluation, Pod, PredicateSet, PrioritySet, Taint, Toleration};

/// Sentinel score for nodes filtered out by a failed predicate.
pub const SCORE_FILTERED: i32 = -1;

/// Seam for the randomized demo data embedded in the simulation. Inject a
/// scripted implementation to make scenarios reproducible.
pub trait DemoDataSource {
    /// Taints carried by a node for this scheduling pass only.
    fn node_taints(&mut self, node_id: &str) -> SmallVec<[Taint; 2]>;
    /// Tolerations attached to the pod under evaluation.
    fn pod_tolerations(&mut self) -> SmallVec<[Toleration; 2]>;
    /// Priority scores for one node.
    fn priorities(&mut self) -> PrioritySet;
    /// Pod IP allocated by the CNI step of the kubelet flow.
    fn pod_ip(&mut self) -> String;
}

const TAINT_POOL: &[(&str, &str)] =
    &[("dedicated", "gpu"), ("env", "production"), ("node-role", "infra")];

/// Default source: uniform draws from a small fixed pool, optionally seeded
/// so a demo run can be replayed.
pub struct RandomDemo {
    rng: SmallRng,
}

impl RandomDemo {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl DemoDataSource for RandomDemo {
    fn node_taints(&mut self, _node_id: &str) -> SmallVec<[Taint; 2]> {
        let mut taints = SmallVec::new();
        if self.rng.random_ratio(1, 3) {
            let (key, value) = TAINT_POOL[self.rng.random_range(0..TAINT_POOL.len())];
            taints.push(Taint {
                key: key.into(),
                value: value.into(),
                effect: "NoSchedule".into(),
            });
        }
        taints
    }

    fn pod_tolerations(&mut self) -> SmallVec<[Toleration; 2]> {
        let mut tolerations = SmallVec::new();
        for (key, value) in TAINT_POOL {
            if self.rng.random_ratio(2, 3) {
                tolerations.push(Toleration {
                    key: (*key).into(),
                    value: (*value).into(),
                    effect: "NoSchedule".into(),
                });
            }
        }
        tolerations
    }

    fn priorities(&mut self) -> PrioritySet {
        PrioritySet {
            image_locality: self.rng.random_range(0..=10),
            least_requested: self.rng.random_range(0..=10),
        }
    }

    fn pod_ip(&mut self) -> String {
        format!("172.16.0.{}", self.rng.random_range(10..=209))
    }
}

/// Scripted source for tests and canned demos: values are served from
/// queues with fixed fallbacks once drained.
#[derive(Default)]
pub struct ScriptedDemo {
    pub taints_by_node: FxHashMap<String, SmallVec<[Taint; 2]>>,
    pub tolerations: SmallVec<[Toleration; 2]>,
    pub priorities: VecDeque<PrioritySet>,
    pub ips: VecDeque<String>,
}

impl DemoDataSource for ScriptedDemo {
    fn node_taints(&mut self, node_id: &str) -> SmallVec<[Taint; 2]> {
        self.taints_by_node.get(node_id).cloned().unwrap_or_default()
    }

    fn pod_tolerations(&mut self) -> SmallVec<[Toleration; 2]> {
        self.tolerations.clone()
    }

    fn priorities(&mut self) -> PrioritySet {
        self.priorities
            .pop_front()
            .unwrap_or(PrioritySet { image_locality: 5, least_requested: 5 })
    }

    fn pod_ip(&mut self) -> String {
        self.ips.pop_front().unwrap_or_else(|| "172.16.0.99".into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedNode {
    pub id: String,
    pub name: String,
}

/// Result of one scheduling pass: per-node detail for the visualization
/// plus the winning node, if any node survived filtering.
#[derive(Debug, Clone)]
pub struct SchedulingOutcome {
    pub evaluations: Vec<NodeEvaluation>,
    pub selected: Option<SelectedNode>,
}

impl SchedulingOutcome {
    /// Evaluations as shown during the filtering phase: predicate results
    /// only, scores not yet computed.
    pub fn filtering_view(&self) -> Vec<NodeEvaluation> {
        self.evaluations
            .iter()
            .cloned()
            .map(|mut ev| {
                ev.priorities = None;
                ev.score = None;
                ev
            })
            .collect()
    }
}

/// One scheduling pass for `pod` (tolerations already attached) over
/// `nodes`. Resource-fit and disk-conflict predicates are always-true
/// placeholders; taint toleration is the one real filter. Composite score
/// is `(image_locality + least_requested) * 5` for feasible nodes, the
/// `-1` sentinel otherwise. Ties go to the first node encountered.
pub fn evaluate(pod: &Pod, nodes: &[Node], source: &mut dyn DemoDataSource) -> SchedulingOutcome {
    let mut evaluations = Vec::with_capacity(nodes.len());

    for node in nodes {
        let taints = source.node_taints(&node.id);
        let tolerated =
            taints.iter().all(|t| pod.tolerations.iter().any(|tol| tol.tolerates(t)));
        let predicates = PredicateSet {
            pod_fits_resources: true,
            no_disk_conflict: true,
            pod_tolerates_node_taints: tolerated,
        };

        let (priorities, score) = if predicates.all_pass() {
            let p = source.priorities();
            (Some(p), (p.image_locality + p.least_requested) * 5)
        } else {
            (None, SCORE_FILTERED)
        };

        debug!(node = %node.id, pod = %pod.id, score, tolerated, "evaluated node");
        evaluations.push(NodeEvaluation {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            taints,
            predicates: Some(predicates),
            priorities,
            score: Some(score),
        });
    }

    let mut selected: Option<(usize, i32)> = None;
    for (i, ev) in evaluations.iter().enumerate() {
        let score = ev.score.unwrap_or(SCORE_FILTERED);
        if score == SCORE_FILTERED {
            continue;
        }
        match selected {
            Some((_, best)) if best >= score => {}
            _ => selected = Some((i, score)),
        }
    }

    let selected = selected.map(|(i, _)| SelectedNode {
        id: evaluations[i].node_id.clone(),
        name: evaluations[i].node_name.clone(),
    });

    SchedulingOutcome { evaluations, selected }
}
