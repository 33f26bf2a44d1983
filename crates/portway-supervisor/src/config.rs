//! Supervisor configuration

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`crate::TunnelSupervisor`] instance
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Directory holding the registry file (`tunnels.json`)
    pub data_dir: PathBuf,
    /// How long to wait after spawn before re-checking that the SSH process
    /// is still alive; an exit inside this window is reported as SpawnFailed
    pub grace_period: Duration,
    /// SSH client executable
    pub ssh_program: String,
    /// Password-feeding wrapper executable used for password auth
    pub sshpass_program: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|home| home.join(".portway"))
            .unwrap_or_else(|| PathBuf::from(".portway"));
        Self {
            data_dir,
            grace_period: Duration::from_millis(500),
            ssh_program: "ssh".to_string(),
            sshpass_program: "sshpass".to_string(),
        }
    }
}
