//! SSH key inventory model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key algorithm, inferred from the key's filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Rsa,
    Ed25519,
    Ecdsa,
    Unknown,
}

impl KeyType {
    /// Algorithm name as passed to `ssh-keygen -t`.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "rsa",
            KeyType::Ed25519 => "ed25519",
            KeyType::Ecdsa => "ecdsa",
            KeyType::Unknown => "unknown",
        }
    }

    /// Infer the algorithm from a key filename.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("ed25519") {
            KeyType::Ed25519
        } else if lower.contains("ecdsa") {
            KeyType::Ecdsa
        } else if lower.contains("rsa") {
            KeyType::Rsa
        } else {
            KeyType::Unknown
        }
    }
}

/// One private key on disk, as reported by the inventory.
///
/// Only metadata is exposed here; private key material is never returned
/// through any read operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Filename of the private key, also its logical name
    pub name: String,
    pub key_type: KeyType,
    /// Whether a companion `<name>.pub` exists
    pub has_public_key: bool,
    pub modified_at: DateTime<Utc>,
}

/// Key generation request
#[derive(Debug, Clone, Deserialize)]
pub struct KeygenRequest {
    pub name: String,
    pub key_type: KeyType,
    /// Key size; required and bounded to [2048, 4096] for RSA only
    #[serde(default)]
    pub bits: Option<u32>,
}

/// Result of a successful key generation
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedKey {
    /// Private key filename
    pub private_key: String,
    /// Public key filename
    pub public_key: String,
    /// Trimmed content of the generated `.pub` file
    pub public_key_content: String,
}
