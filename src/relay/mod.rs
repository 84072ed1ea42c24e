//! Chat relay — turn orchestration and the HTTP surface around it.

pub mod orchestrator;
pub mod routes;

pub use orchestrator::{ChatTurn, NO_MESSAGE, TurnOrchestrator, TurnReply};
pub use routes::{RelayState, relay_app, relay_routes};
