//! Capability matching for capwork
//!
//! Provides:
//! - Hierarchical skill lookup (`Web:React:Hooks` falls back to `Web:React`, then `Web`)
//! - Multi-factor candidate scoring behind the [`Scorer`] trait
//! - Deterministic ranking of candidates

pub mod candidate;
pub mod matcher;
pub mod scoring;

pub use candidate::*;
pub use matcher::*;
pub use scoring::*;
