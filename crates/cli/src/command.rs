//! Terminal command surface: text in, one intent (or a local echo) out.
//! Parse failures never reach the dispatch boundary.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Clear,
    RunPod { name: String },
    ExposePod { name: String },
    Scale { name: String, replicas: u32 },
    GetPods,
    Curl { url: String },
    Play,
    Pause,
    Next,
    Exit,
    /// Blank input; nothing to do.
    Empty,
    /// Malformed arguments; the payload is the usage line to echo.
    Usage(&'static str),
    /// Anything unrecognized; echoed back verbatim.
    NotFound(String),
}

pub fn parse(input: &str) -> Command {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    match parts.as_slice() {
        ["help"] => Command::Help,
        ["clear"] => Command::Clear,
        ["play"] => Command::Play,
        ["pause"] => Command::Pause,
        ["next"] => Command::Next,
        ["exit"] | ["quit"] => Command::Exit,
        ["kubectl", "get", "pods"] => Command::GetPods,
        ["kubectl", "run", name, ..] => Command::RunPod { name: (*name).to_string() },
        ["kubectl", "run"] => Command::Usage("Error: Name required"),
        ["kubectl", "expose", "pod", name] => Command::ExposePod { name: (*name).to_string() },
        ["kubectl", "expose", ..] => Command::Usage("Usage: kubectl expose pod <name>"),
        ["kubectl", "scale", name, replicas] => match replicas.parse::<u32>() {
            Ok(replicas) => Command::Scale { name: (*name).to_string(), replicas },
            Err(_) => Command::Usage("Usage: kubectl scale <name> <replicas>"),
        },
        ["kubectl", "scale", ..] => Command::Usage("Usage: kubectl scale <name> <replicas>"),
        ["curl", url] => Command::Curl { url: (*url).to_string() },
        ["curl", ..] => Command::Usage("Usage: curl <ip>"),
        _ => Command::NotFound(trimmed.to_string()),
    }
}

pub const HELP: &str = "Available commands:\n  kubectl run <name>            create a pod\n  kubectl expose pod <name>     expose a pod as a service\n  kubectl scale <name> <n>      scale a deployment (upsert)\n  kubectl get pods              list pods\n  curl <ip>                     send a request to a service IP\n  next                          execute the next queued step\n  play / pause                  toggle autoplay\n  clear                         clear the screen\n  exit                          leave the simulator";
