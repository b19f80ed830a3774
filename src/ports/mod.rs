//! Port traits for the collaborators around the signal engine.

pub mod config_port;
pub mod data_port;
pub mod notify_port;
pub mod state_port;
