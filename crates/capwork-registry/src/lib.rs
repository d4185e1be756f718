//! Capability registry for capwork.
//!
//! Holds agent profiles, their capabilities and the inverted skill index.
//! Reads go through [`RegistryView`], a read guard over the whole registry,
//! so a match pass never observes a half-applied `add_capability`.

pub mod registry;

pub use registry::*;
