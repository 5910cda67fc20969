//! The four flow generators. Each is a level-triggered scan over the
//! current state: discover unprocessed entities, claim their guard key,
//! and build the full narrated plan synchronously. Plans are enqueued as
//! one `ENQUEUE_STEPS` batch per entity by the engine.

pub(crate) mod curl;
pub(crate) mod kubelet;
pub(crate) mod scheduling;
pub(crate) mod service;

use kubesim_core::{Action, Packet};

/// Packet-hop action with an id unique per (plan, hop).
pub(crate) fn packet(tag: &str, entity_id: &str, from: impl Into<String>, to: impl Into<String>) -> Action {
    Action::AddPacket(Packet {
        id: format!("{tag}-{entity_id}"),
        from: from.into(),
        to: to.into(),
    })
}
