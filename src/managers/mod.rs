pub mod config;
pub mod conversation;
pub mod copilot;
pub mod graph;
