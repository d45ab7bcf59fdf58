//! Realtime propagation: event taxonomy, server-side fan-out, and the
//! reconnecting client with its local view.

pub mod broadcaster;
pub mod client;
pub mod event;
pub mod view;

pub use broadcaster::{Broadcaster, RelaySink};
pub use client::{Backoff, ConnectionState, RealtimeClient};
pub use event::{MissionEvent, RealtimeEvent};
pub use view::MissionView;
