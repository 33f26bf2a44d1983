//! Durable tunnel registry
//!
//! One JSON document per supervisor instance, a mapping of tunnel id to
//! tunnel record, fully rewritten on every mutating operation. Passwords are
//! never part of the persisted shape.

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use portway_proto::{Error, Result, Tunnel};
use tracing::{info, warn};

const REGISTRY_FILE: &str = "tunnels.json";

/// In-memory tunnel records plus their on-disk JSON document
pub struct TunnelRegistry {
    path: PathBuf,
    tunnels: HashMap<String, Tunnel>,
}

impl TunnelRegistry {
    /// Load the registry from `data_dir`, creating the directory if needed.
    ///
    /// A missing file is an empty registry. A corrupt file is logged and
    /// treated as empty rather than blocking startup; the next save rewrites
    /// it.
    pub fn load(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| Error::Persistence(format!("create data directory {data_dir:?}: {e}")))?;
        let path = data_dir.join(REGISTRY_FILE);

        let tunnels = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, Tunnel>>(&bytes) {
                Ok(tunnels) => {
                    info!(count = tunnels.len(), path = ?path, "loaded tunnel registry");
                    tunnels
                }
                Err(err) => {
                    warn!(path = ?path, %err, "registry file is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(Error::Persistence(format!("read registry {path:?}: {e}")));
            }
        };

        Ok(Self { path, tunnels })
    }

    /// Rewrite the whole document. Uses a temp file plus rename so a crash
    /// mid-write cannot leave a truncated registry behind.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.tunnels)
            .map_err(|e| Error::Persistence(format!("serialize registry: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| Error::Persistence(format!("write registry {tmp:?}: {e}")))?;
        let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Persistence(format!("replace registry {:?}: {e}", self.path)))?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Tunnel> {
        self.tunnels.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Tunnel> {
        self.tunnels.get_mut(id)
    }

    pub fn insert(&mut self, tunnel: Tunnel) {
        self.tunnels.insert(tunnel.id.clone(), tunnel);
    }

    pub fn remove(&mut self, id: &str) -> Option<Tunnel> {
        self.tunnels.remove(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tunnel> {
        self.tunnels.values_mut()
    }

    /// Stable-order snapshot, sorted by id.
    pub fn snapshot(&self) -> Vec<Tunnel> {
        let mut tunnels: Vec<Tunnel> = self.tunnels.values().cloned().collect();
        tunnels.sort_by(|a, b| a.id.cmp(&b.id));
        tunnels
    }

    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }
}
