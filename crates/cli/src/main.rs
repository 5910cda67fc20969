use std::io::Write as _;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use kubesim_core::{Action, Pod, PodStatus, Service, ServicePort};
use kubesim_engine::{SimulationEngine, DEFAULT_STEP_INTERVAL_MS};
use kubesim_sched::RandomDemo;
use kubesim_store::StoreOptions;

mod command;

use command::Command;

#[derive(Parser, Debug)]
#[command(name = "kubesim", version, about = "Narrated Kubernetes cluster simulator")]
struct Cli {
    /// Seed for the demo data (taints, tolerations, scores, pod IPs);
    /// omit for a fresh scenario each run
    #[arg(long)]
    seed: Option<u64>,

    /// Autoplay period in milliseconds
    #[arg(long = "interval-ms", default_value_t = DEFAULT_STEP_INTERVAL_MS)]
    interval_ms: u64,

    /// Start with autoplay enabled instead of manual stepping
    #[arg(long, action = ArgAction::SetTrue)]
    play: bool,

    /// Reject unrecognized action kinds at the JSON boundary
    #[arg(long = "strict-actions", action = ArgAction::SetTrue)]
    strict_actions: bool,
}

fn init_tracing() {
    let env = std::env::var("KUBESIM_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KUBESIM_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KUBESIM_METRICS_ADDR; expected host:port");
        }
    }
}

/// Tracks how much of the append-only surfaces we have already rendered.
struct Renderer {
    events_shown: usize,
}

impl Renderer {
    fn new() -> Self {
        Self { events_shown: 0 }
    }

    /// Print the consumed step, animate its packets (a printed hop, then
    /// removal), and echo any newly appended events.
    fn render_step(&mut self, engine: &mut SimulationEngine, description: &str) {
        let remaining = engine.state().step_queue.len();
        println!("[step] {description} ({remaining} queued)");

        let packets = engine.state().packets.clone();
        for p in packets {
            println!("       .. {} -> {}", p.from, p.to);
            engine.dispatch(Action::RemovePacket(p.id));
        }
        self.render_events(engine);
    }

    fn render_events(&mut self, engine: &SimulationEngine) {
        for ev in &engine.state().events[self.events_shown..] {
            println!("       [{}] {}", ev.kind, ev.message);
        }
        self.events_shown = engine.state().events.len();
    }
}

enum Flow {
    Continue,
    Quit,
}

fn handle_line(engine: &mut SimulationEngine, renderer: &mut Renderer, line: &str) -> Flow {
    match command::parse(line) {
        Command::Help => println!("{}", command::HELP),
        Command::Clear => print!("\x1b[2J\x1b[1;1H"),
        Command::Exit => return Flow::Quit,
        Command::Empty => {}
        Command::Usage(msg) => println!("{msg}"),
        Command::NotFound(input) => println!("Command not found: {input}"),

        Command::RunPod { name } => {
            println!("pod/{name} created");
            engine.dispatch(Action::AddPod(Pod {
                id: format!("pod-{}", uuid::Uuid::new_v4()),
                name,
                status: PodStatus::Pending,
                node_id: None,
                ip: None,
                tolerations: Default::default(),
            }));
            renderer.render_events(engine);
        }
        Command::ExposePod { name } => {
            println!("service/{name} exposed");
            let mut selector = std::collections::BTreeMap::new();
            selector.insert("app".to_string(), name.clone());
            engine.dispatch(Action::AddService(Service {
                id: format!("svc-{}", uuid::Uuid::new_v4()),
                name,
                selector,
                cluster_ip: "10.96.0.10".into(),
                ports: vec![ServicePort { port: 80, target_port: 80 }],
            }));
            renderer.render_events(engine);
        }
        Command::Scale { name, replicas } => {
            println!("deployment.apps/{name} scaled");
            engine.dispatch(Action::UpdateDeploymentScale { name, replicas });
            renderer.render_events(engine);
        }
        Command::Curl { url } => {
            println!("Sending request to {url}...");
            engine.dispatch(Action::StartCurl { url });
        }
        Command::GetPods => print_pods(engine),

        Command::Play => {
            engine.set_playing(true);
            println!("Autoplay on ({} steps queued)", engine.state().step_queue.len());
        }
        Command::Pause => {
            engine.set_playing(false);
            println!("Autoplay off");
        }
        Command::Next => match engine.step() {
            Some(description) => renderer.render_step(engine, &description),
            None => {
                if engine.state().is_playing {
                    println!("Autoplay is on; pause first to step manually");
                } else {
                    println!("Step queue is empty");
                }
            }
        },
    }
    Flow::Continue
}

fn print_pods(engine: &SimulationEngine) {
    let pods = &engine.state().pods;
    if pods.is_empty() {
        println!("No resources found");
        return;
    }
    println!("{:<24} {:<20} {:<16} {:<16}", "NAME", "STATUS", "IP", "NODE");
    for p in pods {
        println!(
            "{:<24} {:<20} {:<16} {:<16}",
            p.name,
            p.status.to_string(),
            p.ip.as_deref().unwrap_or("<none>"),
            p.node_id.as_deref().unwrap_or("<none>"),
        );
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    debug!(?cli, "starting");

    let demo = RandomDemo::new(cli.seed);
    let mut engine = SimulationEngine::new(
        StoreOptions { strict_actions: cli.strict_actions },
        Box::new(demo),
    );
    if cli.play {
        engine.set_playing(true);
    }
    let mut renderer = Renderer::new();

    println!("kubesim: narrated Kubernetes cluster simulator");
    println!("Type \"help\" for available commands.");
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if let Flow::Quit = handle_line(&mut engine, &mut renderer, &line) {
                            break;
                        }
                        prompt();
                    }
                    None => break, // stdin closed
                }
            }
            _ = ticker.tick() => {
                if let Some(description) = engine.tick() {
                    println!();
                    renderer.render_step(&mut engine, &description);
                    prompt();
                }
            }
        }
    }

    Ok(())
}
