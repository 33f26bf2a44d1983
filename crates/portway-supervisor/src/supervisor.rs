//! Tunnel lifecycle orchestration
//!
//! Composes the durable registry and the process supervisor behind the
//! public create/start/stop/delete/list operations. All registry access
//! happens under one exclusive lock per operation, so the five operations
//! fully serialize with respect to one another; tunnel counts are small and
//! operations infrequent, which is exactly the trade this buys.

use std::sync::Arc;

use chrono::Utc;
use portway_keys::KeyStore;
use portway_proto::{AuthType, Error, Result, Tunnel, TunnelSpec, TunnelStatus};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SupervisorConfig;
use crate::process::ProcessSupervisor;
use crate::registry::TunnelRegistry;
use crate::validate;

/// Supervisor for external SSH port-forwarding tunnels
pub struct TunnelSupervisor {
    keys: Arc<KeyStore>,
    process: ProcessSupervisor,
    registry: Mutex<TunnelRegistry>,
}

impl TunnelSupervisor {
    /// Load the registry from the configured data directory and build the
    /// supervisor. Tunnels recorded as running are left as-is; the first
    /// `list` reconciles them against the live process table.
    pub fn new(config: SupervisorConfig, keys: Arc<KeyStore>) -> Result<Self> {
        let registry = TunnelRegistry::load(&config.data_dir)?;
        let process = ProcessSupervisor::new(
            config.ssh_program,
            config.sshpass_program,
            config.grace_period,
        );
        Ok(Self {
            keys,
            process,
            registry: Mutex::new(registry),
        })
    }

    /// Validate the spec, launch the SSH process, and record the tunnel as
    /// running. Nothing is written to the registry unless the spawn
    /// succeeded.
    pub async fn create(&self, spec: TunnelSpec) -> Result<Tunnel> {
        let mut registry = self.registry.lock().await;

        let normalized = validate::normalize(&spec, &self.keys)?;
        let pid = self.process.spawn(&normalized.to_spawn_spec()).await?;

        let tunnel = Tunnel {
            id: Uuid::new_v4().to_string(),
            status: TunnelStatus::Running,
            pid,
            host: normalized.host,
            port: normalized.port,
            user: normalized.user,
            auth: normalized.auth,
            key_name: normalized.key_name,
            forward: normalized.forward,
            local_port: normalized.local_port,
            remote_host: normalized.remote_host,
            remote_port: normalized.remote_port,
            since: Some(Utc::now()),
        };

        registry.insert(tunnel.clone());
        persist_best_effort(&registry, "create");

        info!(
            id = %tunnel.id,
            pid,
            endpoint = %format!("{}@{}", tunnel.user, tunnel.host),
            forward = ?tunnel.forward,
            "created tunnel"
        );
        Ok(tunnel)
    }

    /// Re-launch a stopped tunnel from its stored, non-secret parameters.
    ///
    /// Passwords are never persisted, so a password-auth tunnel cannot be
    /// restarted here; callers get `CredentialsRequired` and must issue a
    /// fresh `create` with the password instead.
    pub async fn start(&self, id: &str) -> Result<Tunnel> {
        let mut registry = self.registry.lock().await;

        let tunnel = registry
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("tunnel {id:?}")))?;

        if tunnel.status == TunnelStatus::Running
            && tunnel.pid > 0
            && self.process.is_alive(tunnel.pid)
        {
            return Err(Error::AlreadyRunning(format!("tunnel {id:?}")));
        }
        if tunnel.auth == AuthType::Password {
            return Err(Error::CredentialsRequired(format!(
                "tunnel {id:?} uses password auth and its password is not stored; create it again"
            )));
        }

        let normalized = validate::normalize(&tunnel.to_spec(), &self.keys)?;
        let pid = self.process.spawn(&normalized.to_spawn_spec()).await?;

        let tunnel = registry.get_mut(id).expect("checked above under the lock");
        tunnel.pid = pid;
        tunnel.status = TunnelStatus::Running;
        tunnel.since = Some(Utc::now());
        let tunnel = tunnel.clone();
        persist_best_effort(&registry, "start");

        info!(id = %id, pid, "started tunnel");
        Ok(tunnel)
    }

    /// Request termination and mark the tunnel stopped.
    ///
    /// Idempotent from the caller's point of view: the record is marked
    /// stopped with pid 0 whether or not the signal reached anything.
    pub async fn stop(&self, id: &str) -> Result<Tunnel> {
        let mut registry = self.registry.lock().await;

        let tunnel = registry
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("tunnel {id:?}")))?;

        if tunnel.pid > 0 {
            info!(id = %id, pid = tunnel.pid, "stopping tunnel");
            if let Err(err) = self.process.terminate(tunnel.pid) {
                warn!(id = %id, pid = tunnel.pid, %err, "failed to signal tunnel process");
            }
        }

        tunnel.status = TunnelStatus::Stopped;
        tunnel.pid = 0;
        let tunnel = tunnel.clone();
        persist_best_effort(&registry, "stop");

        Ok(tunnel)
    }

    /// Stop the process if running and remove the record. Terminal for this
    /// id; ids are never reused.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut registry = self.registry.lock().await;

        let tunnel = registry
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("tunnel {id:?}")))?;

        if tunnel.pid > 0 {
            if let Err(err) = self.process.terminate(tunnel.pid) {
                warn!(id = %id, pid = tunnel.pid, %err, "failed to signal tunnel process");
            }
        }
        persist_best_effort(&registry, "delete");

        info!(id = %id, "deleted tunnel");
        Ok(())
    }

    /// Snapshot of all tunnels, reconciled against the live process table.
    ///
    /// This read has a documented side effect: there is no background
    /// poller, so any tunnel whose process died since the last call is
    /// flipped to stopped here, and the registry is persisted when that
    /// happens.
    pub async fn list(&self) -> Result<Vec<Tunnel>> {
        let mut registry = self.registry.lock().await;

        let mut changed = false;
        for tunnel in registry.iter_mut() {
            let alive = tunnel.pid > 0 && self.process.is_alive(tunnel.pid);
            if alive {
                if tunnel.status != TunnelStatus::Running {
                    tunnel.status = TunnelStatus::Running;
                    changed = true;
                }
            } else if tunnel.status != TunnelStatus::Stopped || tunnel.pid != 0 {
                debug!(id = %tunnel.id, pid = tunnel.pid, "tunnel process is gone");
                tunnel.status = TunnelStatus::Stopped;
                tunnel.pid = 0;
                changed = true;
            }
        }

        if changed {
            persist_best_effort(&registry, "list");
        }

        Ok(registry.snapshot())
    }
}

/// Persistence after a successful mutation is best-effort: the in-memory
/// state already reflects the change, so a write failure is logged instead
/// of failing the operation.
fn persist_best_effort(registry: &TunnelRegistry, operation: &str) {
    if let Err(err) = registry.save() {
        warn!(operation, %err, "failed to persist tunnel registry");
    }
}
