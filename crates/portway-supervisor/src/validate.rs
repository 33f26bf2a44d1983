//! Tunnel spec validation and normalization

use std::net::IpAddr;

use portway_keys::KeyStore;
use portway_proto::{
    AuthType, Error, ForwardType, Result, TunnelSpec, DEFAULT_REMOTE_HOST, DEFAULT_SSH_PORT,
};

use crate::process::{SpawnAuth, SpawnSpec};

/// A spec that passed validation, with defaults applied.
///
/// `remote_host`/`remote_port` are cleared for dynamic forwards; the
/// credential is already resolved to a key path or an in-flight password.
#[derive(Debug)]
pub(crate) struct NormalizedSpec {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: AuthType,
    pub key_name: Option<String>,
    pub forward: ForwardType,
    pub local_port: u16,
    pub remote_host: Option<String>,
    pub remote_port: Option<u16>,
    pub spawn_auth: SpawnAuth,
}

impl NormalizedSpec {
    pub fn to_spawn_spec(&self) -> SpawnSpec {
        SpawnSpec {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            forward: self.forward,
            local_port: self.local_port,
            remote_host: self
                .remote_host
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_HOST.to_string()),
            remote_port: self.remote_port.unwrap_or(0),
            auth: self.spawn_auth.clone(),
        }
    }
}

/// Validate a create/start spec and resolve its credential.
pub(crate) fn normalize(spec: &TunnelSpec, keys: &KeyStore) -> Result<NormalizedSpec> {
    if spec.host.is_empty() {
        return Err(Error::Validation("host is required".into()));
    }
    if !is_valid_host(&spec.host) {
        return Err(Error::Validation(format!("invalid host {:?}", spec.host)));
    }

    if spec.user.is_empty() {
        return Err(Error::Validation("user is required".into()));
    }
    if !is_valid_user(&spec.user) {
        return Err(Error::Validation(format!("invalid SSH user {:?}", spec.user)));
    }

    let port = spec.port.unwrap_or(DEFAULT_SSH_PORT);
    if port == 0 {
        return Err(Error::Validation("SSH port must be in [1, 65535]".into()));
    }

    if spec.local_port == 0 {
        return Err(Error::Validation("local port must be in [1, 65535]".into()));
    }

    let (remote_host, remote_port) = match spec.forward {
        ForwardType::Dynamic => (None, None),
        ForwardType::Local | ForwardType::Remote => {
            let remote_port = match spec.remote_port {
                Some(p) if p > 0 => p,
                _ => {
                    return Err(Error::Validation(
                        "remote port must be in [1, 65535]".into(),
                    ))
                }
            };
            let remote_host = spec
                .remote_host
                .clone()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_REMOTE_HOST.to_string());
            if !is_valid_host(&remote_host) {
                return Err(Error::Validation(format!(
                    "invalid remote host {remote_host:?}"
                )));
            }
            (Some(remote_host), Some(remote_port))
        }
    };

    let spawn_auth = match spec.auth {
        AuthType::Key => {
            let key_name = spec
                .key_name
                .as_deref()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| Error::Validation("key name is required for key auth".into()))?;
            if !keys.exists(key_name) {
                return Err(Error::Validation(format!(
                    "key {key_name:?} not found in inventory"
                )));
            }
            SpawnAuth::Key(keys.path(key_name))
        }
        AuthType::Password => {
            let password = spec
                .password
                .clone()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    Error::Validation("password is required for password auth".into())
                })?;
            SpawnAuth::Password(password)
        }
    };

    Ok(NormalizedSpec {
        host: spec.host.clone(),
        port,
        user: spec.user.clone(),
        auth: spec.auth,
        key_name: spec.key_name.clone(),
        forward: spec.forward,
        local_port: spec.local_port,
        remote_host,
        remote_port,
        spawn_auth,
    })
}

/// Syntactically valid hostname or IP literal.
fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    if host.len() > 253 {
        return false;
    }
    let pattern = regex_lite::Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?$").unwrap();
    pattern.is_match(host)
}

/// Conservative login-name pattern.
fn is_valid_user(user: &str) -> bool {
    let pattern = regex_lite::Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap();
    pattern.is_match(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keystore_with(names: &[&str]) -> (KeyStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::new(dir.path()).unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), "material").unwrap();
        }
        (store, dir)
    }

    fn base_spec() -> TunnelSpec {
        TunnelSpec {
            host: "example.com".into(),
            port: None,
            user: "alice".into(),
            auth: AuthType::Key,
            key_name: Some("id_ed25519".into()),
            password: None,
            forward: ForwardType::Local,
            local_port: 8080,
            remote_host: None,
            remote_port: Some(80),
        }
    }

    #[test]
    fn host_and_user_patterns() {
        assert!(is_valid_host("example.com"));
        assert!(is_valid_host("10.0.0.1"));
        assert!(is_valid_host("::1"));
        assert!(!is_valid_host("-bad.example"));
        assert!(!is_valid_host("host name"));

        assert!(is_valid_user("deploy-user.1_x"));
        assert!(!is_valid_user("alice bob"));
        assert!(!is_valid_user("alice;rm"));
    }

    #[test]
    fn defaults_applied() {
        let (keys, _dir) = keystore_with(&["id_ed25519"]);
        let normalized = normalize(&base_spec(), &keys).unwrap();
        assert_eq!(normalized.port, 22);
        assert_eq!(normalized.remote_host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn local_forward_requires_remote_port() {
        let (keys, _dir) = keystore_with(&["id_ed25519"]);
        let mut spec = base_spec();
        spec.remote_port = Some(0);
        assert!(matches!(
            normalize(&spec, &keys),
            Err(Error::Validation(_))
        ));

        spec.remote_port = None;
        assert!(matches!(
            normalize(&spec, &keys),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn dynamic_forward_ignores_remote_fields() {
        let (keys, _dir) = keystore_with(&["id_ed25519"]);
        let mut spec = base_spec();
        spec.forward = ForwardType::Dynamic;
        spec.remote_port = None;
        spec.remote_host = Some("ignored.example".into());

        let normalized = normalize(&spec, &keys).unwrap();
        assert!(normalized.remote_host.is_none());
        assert!(normalized.remote_port.is_none());
    }

    #[test]
    fn key_auth_requires_existing_key() {
        let (keys, _dir) = keystore_with(&[]);
        let spec = base_spec();
        let err = normalize(&spec, &keys).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn password_auth_requires_password() {
        let (keys, _dir) = keystore_with(&[]);
        let mut spec = base_spec();
        spec.auth = AuthType::Password;
        spec.key_name = None;
        assert!(matches!(
            normalize(&spec, &keys),
            Err(Error::Validation(_))
        ));

        spec.password = Some("secret".into());
        let normalized = normalize(&spec, &keys).unwrap();
        assert!(matches!(normalized.spawn_auth, SpawnAuth::Password(_)));
    }

    #[test]
    fn port_zero_rejected() {
        let (keys, _dir) = keystore_with(&["id_ed25519"]);
        let mut spec = base_spec();
        spec.port = Some(0);
        assert!(normalize(&spec, &keys).is_err());

        let mut spec = base_spec();
        spec.local_port = 0;
        assert!(normalize(&spec, &keys).is_err());
    }
}
