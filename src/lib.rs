//! NutriBot relay — forwards chat turns to a hosted AI agent and layers
//! per-conversation preferences onto the first message of each thread.

pub mod agent;
pub mod config;
pub mod error;
pub mod preferences;
pub mod relay;
