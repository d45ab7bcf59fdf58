//! REST endpoints.

pub mod agents;
pub mod channels;
pub mod chat;
pub mod emergency;
pub mod snapshot;
pub mod tasks;

pub use agents::{create_agent, delete_agent, list_agents, update_agent};
pub use channels::{get_active_channel, put_active_channel};
pub use chat::post_chat;
pub use emergency::post_emergency;
pub use snapshot::{get_snapshot, health_check};
pub use tasks::{delete_task, move_task, update_task};
