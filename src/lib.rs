//! Portway - supervisor for external SSH port-forwarding tunnels
//!
//! Exposes remote SSH tunnels (local, remote, and dynamic/SOCKS forwards) as
//! a managed resource with a durable registry that survives restarts, plus
//! the inventory of SSH key-pairs used to authenticate them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use portway::{KeyStore, SupervisorConfig, TunnelSupervisor};
//!
//! # fn main() -> portway::Result<()> {
//! let keys = Arc::new(KeyStore::new("/var/lib/portway/keys")?);
//! let supervisor = TunnelSupervisor::new(SupervisorConfig::default(), keys)?;
//! # Ok(())
//! # }
//! ```

pub use portway_proto as proto;

pub use portway_keys::KeyStore;
pub use portway_proto::{
    AuthType, Error, ForwardType, GeneratedKey, KeyInfo, KeyType, KeygenRequest, Result, Tunnel,
    TunnelSpec, TunnelStatus,
};
pub use portway_supervisor::{SupervisorConfig, TunnelSupervisor};
