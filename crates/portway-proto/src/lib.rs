//! Shared types for the Portway tunnel supervisor
//!
//! This crate defines the tunnel and key data model plus the error taxonomy
//! shared by the key inventory and the supervisor.

pub mod error;
pub mod key;
pub mod tunnel;

pub use error::{Error, Result};
pub use key::{GeneratedKey, KeyInfo, KeyType, KeygenRequest};
pub use tunnel::{AuthType, ForwardType, Tunnel, TunnelSpec, TunnelStatus};

/// Default SSH port when a spec leaves it unset
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default target host for local/remote forwards
pub const DEFAULT_REMOTE_HOST: &str = "127.0.0.1";
