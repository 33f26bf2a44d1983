//! Tunnel supervision
//!
//! This crate spawns and tracks the external SSH client processes that
//! implement port-forwarding tunnels, reconciles desired vs. observed state,
//! and persists the tunnel registry across restarts of the managing process.
//!
//! The [`TunnelSupervisor`] is the public entry point; it composes the
//! durable [`registry::TunnelRegistry`] and the stateless
//! [`process::ProcessSupervisor`] behind the create/start/stop/delete/list
//! lifecycle operations.

pub mod config;
pub mod process;
pub mod registry;
pub mod supervisor;
mod validate;

pub use config::SupervisorConfig;
pub use process::ProcessSupervisor;
pub use registry::TunnelRegistry;
pub use supervisor::TunnelSupervisor;
