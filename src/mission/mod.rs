//! Mission state: data model, merge rules, the authoritative store, the
//! configured-agent registry and the snapshot synthesizer.

pub mod analytics;
pub mod merge;
pub mod registry;
pub mod store;
pub mod synth;
pub mod types;

pub use merge::TaskPatch;
pub use registry::{AgentDraft, AgentRegistry, ConfiguredAgent};
pub use store::MissionStore;
pub use synth::SnapshotSynthesizer;
pub use types::*;
