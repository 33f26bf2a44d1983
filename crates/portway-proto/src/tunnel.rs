//! Tunnel data model
//!
//! The persisted record (`Tunnel`) and the in-flight create request
//! (`TunnelSpec`) are deliberately two different types: the password exists
//! only on the spec and is never written to the registry or echoed back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last observed state of a tunnel's backing process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    Running,
    Stopped,
}

/// SSH forwarding mode (`-L` / `-R` / `-D`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardType {
    Local,
    Remote,
    Dynamic,
}

/// How the tunnel authenticates to the SSH endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Key,
    Password,
}

/// One supervised port-forwarding session, as recorded in the registry.
///
/// `pid` is a weak handle: the OS owns the process, and the value is only
/// meaningful while `status` is `Running`. Reconciliation clears a stale pid
/// together with flipping the status to `Stopped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tunnel {
    /// Opaque unique id, assigned at creation, never reused
    pub id: String,
    pub status: TunnelStatus,
    /// Backing process id; 0 while stopped
    #[serde(default)]
    pub pid: u32,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: AuthType,
    /// Key inventory reference, set iff `auth` is `Key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    pub forward: ForwardType,
    pub local_port: u16,
    /// Target host for local/remote forwards; meaningless for dynamic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
    /// Timestamp of the most recent successful start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl Tunnel {
    /// Reconstruct the non-secret spawn spec for a restart via `start`.
    pub fn to_spec(&self) -> TunnelSpec {
        TunnelSpec {
            host: self.host.clone(),
            port: Some(self.port),
            user: self.user.clone(),
            auth: self.auth,
            key_name: self.key_name.clone(),
            password: None,
            forward: self.forward,
            local_port: self.local_port,
            remote_host: self.remote_host.clone(),
            remote_port: self.remote_port,
        }
    }
}

/// Create request for a new tunnel.
///
/// Carries the password for password-auth tunnels; it is consumed by the
/// spawn call and never stored.
#[derive(Clone, Deserialize)]
pub struct TunnelSpec {
    pub host: String,
    /// SSH port; defaults to 22 when unset
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    pub auth: AuthType,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub forward: ForwardType,
    pub local_port: u16,
    /// Defaults to 127.0.0.1 for local/remote forwards
    #[serde(default)]
    pub remote_host: Option<String>,
    #[serde(default)]
    pub remote_port: Option<u16>,
}

// Manual Debug so the password can never leak through a log formatter.
impl std::fmt::Debug for TunnelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("auth", &self.auth)
            .field("key_name", &self.key_name)
            .field("password", &self.password.as_ref().map(|_| "<masked>"))
            .field("forward", &self.forward)
            .field("local_port", &self.local_port)
            .field("remote_host", &self.remote_host)
            .field("remote_port", &self.remote_port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TunnelSpec {
        TunnelSpec {
            host: "example.com".into(),
            port: None,
            user: "alice".into(),
            auth: AuthType::Password,
            key_name: None,
            password: Some("hunter2".into()),
            forward: ForwardType::Local,
            local_port: 8080,
            remote_host: None,
            remote_port: Some(80),
        }
    }

    #[test]
    fn debug_masks_password() {
        let rendered = format!("{:?}", spec());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<masked>"));
    }

    #[test]
    fn tunnel_serde_uses_lowercase_tags() {
        let tunnel = Tunnel {
            id: "t1".into(),
            status: TunnelStatus::Running,
            pid: 42,
            host: "example.com".into(),
            port: 22,
            user: "alice".into(),
            auth: AuthType::Key,
            key_name: Some("id_ed25519".into()),
            forward: ForwardType::Dynamic,
            local_port: 1080,
            remote_host: None,
            remote_port: None,
            since: None,
        };
        let json = serde_json::to_string(&tunnel).unwrap();
        assert!(json.contains("\"status\":\"running\""));
        assert!(json.contains("\"forward\":\"dynamic\""));
        assert!(json.contains("\"auth\":\"key\""));
        // Omitted optionals stay out of the document entirely
        assert!(!json.contains("remote_host"));
    }

    #[test]
    fn spec_round_trips_without_password_in_record() {
        let tunnel = Tunnel {
            id: "t2".into(),
            status: TunnelStatus::Stopped,
            pid: 0,
            host: "example.com".into(),
            port: 2222,
            user: "bob".into(),
            auth: AuthType::Password,
            key_name: None,
            forward: ForwardType::Remote,
            local_port: 3000,
            remote_host: Some("10.0.0.5".into()),
            remote_port: Some(9000),
            since: None,
        };
        let reconstructed = tunnel.to_spec();
        assert_eq!(reconstructed.port, Some(2222));
        assert!(reconstructed.password.is_none());
    }
}
