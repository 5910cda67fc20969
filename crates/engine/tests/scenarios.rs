#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use kubesim_core::{Action, EventKind, Pod, PodStatus, Service, ServicePort, Taint, Toleration};
use kubesim_engine::SimulationEngine;
use kubesim_sched::ScriptedDemo;
use kubesim_store::StoreOptions;

fn engine_with(demo: ScriptedDemo) -> SimulationEngine {
    SimulationEngine::new(StoreOptions::default(), Box::new(demo))
}

fn pending_pod(id: &str, name: &str) -> Pod {
    Pod {
        id: id.into(),
        name: name.into(),
        status: PodStatus::Pending,
        node_id: None,
        ip: None,
        tolerations: Default::default(),
    }
}

fn nginx_service() -> Service {
    let mut selector = BTreeMap::new();
    selector.insert("app".to_string(), "nginx".to_string());
    Service {
        id: "svc-1".into(),
        name: "nginx-svc".into(),
        selector,
        cluster_ip: "10.96.0.10".into(),
        ports: vec![ServicePort { port: 80, target_port: 80 }],
    }
}

fn drain(e: &mut SimulationEngine) {
    while e.step().is_some() {}
}

fn taint(k: &str, v: &str) -> Taint {
    Taint { key: k.into(), value: v.into(), effect: "NoSchedule".into() }
}

fn toleration(k: &str, v: &str) -> Toleration {
    Toleration { key: k.into(), value: v.into(), effect: "NoSchedule".into() }
}

// Scenario A: a pending pod on an untainted (or tolerated) node ends in a
// binding to node-1.
#[test]
fn pending_pod_is_bound_to_node_1() {
    let mut demo = ScriptedDemo::default();
    demo.taints_by_node.insert("node-1".into(), smallvec::smallvec![taint("dedicated", "gpu")]);
    demo.tolerations = smallvec::smallvec![toleration("dedicated", "gpu")];
    let mut e = engine_with(demo);

    e.dispatch(Action::AddPod(pending_pod("p1", "nginx-1")));
    let last = e.state().step_queue.back().cloned().unwrap();
    assert!(last.actions.iter().any(|a| matches!(
        a,
        Action::AssignPodToNode { pod_id, node_id } if pod_id == "p1" && node_id == "node-1"
    )));

    drain(&mut e);
    assert_eq!(e.state().pod("p1").unwrap().node_id.as_deref(), Some("node-1"));
    assert_eq!(e.state().pod("p1").unwrap().status, PodStatus::Running);
}

#[test]
fn untolerated_taint_leaves_pod_pending_forever() {
    let mut demo = ScriptedDemo::default();
    demo.taints_by_node.insert("node-1".into(), smallvec::smallvec![taint("env", "production")]);
    let mut e = engine_with(demo);

    e.dispatch(Action::AddPod(pending_pod("p1", "nginx-1")));
    drain(&mut e);

    let pod = e.state().pod("p1").unwrap();
    assert_eq!(pod.status, PodStatus::Pending);
    assert!(pod.node_id.is_none());
    let err = e
        .state()
        .events
        .iter()
        .find(|ev| ev.kind == EventKind::Error)
        .expect("scheduling failure event");
    assert_eq!(err.message, "Scheduler: 0/1 nodes available for nginx-1");
    // No retry: the queue stays empty and the kubelet flow never fired.
    assert!(e.state().step_queue.is_empty());
    assert!(e.state().events.iter().all(|ev| ev.kind != EventKind::Kubelet));
}

// Scenario B: a service with zero matching Running pods still writes the
// iptables rule, but no endpoints.
#[test]
fn service_without_backends_still_writes_iptables_rule() {
    let mut e = engine_with(ScriptedDemo::default());
    e.dispatch(Action::AddService(nginx_service()));
    drain(&mut e);

    assert!(e.state().networking.endpoints.is_empty());
    assert_eq!(
        e.state().networking.iptables_rules,
        vec!["PREROUTING: 10.96.0.10:80 -> DNAT".to_string()]
    );
    let found = e
        .state()
        .events
        .iter()
        .find(|ev| ev.kind == EventKind::Controller)
        .unwrap();
    assert_eq!(found.message, "Endpoints: Found 0 pods for nginx-svc");
}

#[test]
fn service_with_running_backend_creates_endpoint() {
    let mut demo = ScriptedDemo::default();
    demo.ips.push_back("172.16.0.20".into());
    let mut e = engine_with(demo);

    e.dispatch(Action::AddPod(pending_pod("p1", "nginx-1")));
    drain(&mut e);
    e.dispatch(Action::AddService(nginx_service()));
    drain(&mut e);

    assert_eq!(e.state().networking.endpoints.len(), 1);
    let ep = &e.state().networking.endpoints[0];
    assert_eq!(ep.service, "nginx-svc");
    assert_eq!(ep.pod_ip, "172.16.0.20");
    assert_eq!(ep.node, "node-1");
}

// Scenario C: curl with zero Running pods ends in the no-endpoints error
// and no packet ever targets a pod.
#[test]
fn curl_without_backends_reports_no_endpoints() {
    let mut e = engine_with(ScriptedDemo::default());
    e.dispatch(Action::StartCurl { url: "10.96.0.10".into() });
    drain(&mut e);

    let last = e.state().events.last().unwrap();
    assert_eq!(last.kind, EventKind::Error);
    assert_eq!(last.message, "Network: No endpoints found");
    // Packets are not removed by the engine, so the full hop history is
    // still visible here.
    assert!(e.state().packets.iter().all(|p| !p.to.starts_with("pod-")));
}

#[test]
fn curl_with_backend_reaches_the_pod() {
    let mut demo = ScriptedDemo::default();
    demo.ips.push_back("172.16.0.20".into());
    let mut e = engine_with(demo);

    e.dispatch(Action::AddPod(pending_pod("p1", "nginx-1")));
    drain(&mut e);
    e.dispatch(Action::StartCurl { url: "10.96.0.10".into() });
    drain(&mut e);

    let last = e.state().events.last().unwrap();
    assert_eq!(last.kind, EventKind::Pod);
    assert_eq!(last.message, "Pod nginx-1: 200 OK");
    assert!(e
        .state()
        .events
        .iter()
        .any(|ev| ev.message == "Iptables: DNAT 10.96.0.10 -> 172.16.0.20"));
    assert!(e.state().packets.iter().any(|p| p.to == "pod-p1"));
}

// Scenario D: scaling the same deployment twice upserts, never duplicates.
#[test]
fn scale_upserts_one_deployment() {
    let mut e = engine_with(ScriptedDemo::default());
    e.dispatch(Action::UpdateDeploymentScale { name: "myapp".into(), replicas: 5 });
    e.dispatch(Action::UpdateDeploymentScale { name: "myapp".into(), replicas: 2 });
    assert_eq!(e.state().deployments.len(), 1);
    assert_eq!(e.state().deployments[0].name, "myapp");
    assert_eq!(e.state().deployments[0].replicas, 2);
}

#[test]
fn scheduler_window_opens_and_closes_during_the_plan() {
    let mut e = engine_with(ScriptedDemo::default());
    e.dispatch(Action::AddPod(pending_pod("p1", "nginx-1")));

    let mut opened = false;
    while e.step().is_some() {
        if e.state().show_scheduler_window {
            opened = true;
            assert!(e.state().scheduler_internals.is_some());
        }
    }
    assert!(opened);
    assert!(!e.state().show_scheduler_window);
}

#[test]
fn second_pod_gets_its_own_plan() {
    let mut e = engine_with(ScriptedDemo::default());
    e.dispatch(Action::AddPod(pending_pod("p1", "nginx-1")));
    let depth_one = e.state().step_queue.len();
    e.dispatch(Action::AddPod(pending_pod("p2", "nginx-2")));
    assert_eq!(e.state().step_queue.len(), depth_one * 2);

    drain(&mut e);
    assert_eq!(e.state().pod("p1").unwrap().status, PodStatus::Running);
    assert_eq!(e.state().pod("p2").unwrap().status, PodStatus::Running);
    // Both back-references land on the single node.
    assert_eq!(e.state().nodes[0].pods, vec!["p1".to_string(), "p2".to_string()]);
}

#[test]
fn json_intents_drive_the_same_flows() {
    let mut e = engine_with(ScriptedDemo::default());
    e.dispatch_json(serde_json::json!({
        "type": "ADD_POD",
        "payload": { "id": "p1", "name": "nginx-1", "status": "Pending" }
    }))
    .unwrap();
    assert!(!e.state().step_queue.is_empty());
}
