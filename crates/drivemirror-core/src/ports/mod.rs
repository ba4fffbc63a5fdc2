//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync core depends on, with implementations
//! living in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMirrorTool`] - The external mirroring tool (rclone) as a capability
//!   interface: size probes, listings, transfer and purge

pub mod mirror_tool;

pub use mirror_tool::{IMirrorTool, ToolOutput};
