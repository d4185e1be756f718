//! Shared data model for capwork.
//!
//! Agents, capabilities, tasks and assignments live here together with the
//! error taxonomy and configuration layer used by every other crate in the
//! workspace.

pub mod agent;
pub mod config_manager;
pub mod error;
pub mod logging;
pub mod skill;
pub mod task;
pub mod types;

pub use agent::*;
pub use config_manager::*;
pub use error::*;
pub use task::*;
pub use types::*;
