//! SSH key inventory
//!
//! Manages the key-pairs available for tunnel authentication as plain files
//! in a single directory: one private key file per name plus an optional
//! `<name>.pub` companion. The directory and every private key are kept
//! owner-only.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use portway_proto::{Error, GeneratedKey, KeyInfo, KeyType, KeygenRequest, Result};
use tracing::{debug, info, warn};

/// Filenames that live in an SSH directory but are never private keys
const NON_KEY_FILES: &[&str] = &["known_hosts", "config", "authorized_keys"];

/// Key inventory over one filesystem directory
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// Open (creating if needed) the key directory with owner-only access.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Persistence(format!("create key directory {:?}: {e}", dir)))?;
        let _ = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700));
        Ok(Self { dir })
    }

    /// Full path of a key by name. The name is reduced to its basename so a
    /// caller can never escape the key directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(basename(name))
    }

    /// Whether a private key with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// List all private keys in the directory, sorted by name.
    ///
    /// Public-key companions and well-known non-key files (`known_hosts`,
    /// `config`, `authorized_keys`) are skipped.
    pub fn list(&self) -> Result<Vec<KeyInfo>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "read key directory {:?}: {e}",
                    self.dir
                )))
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Persistence(format!("read key directory entry: {e}")))?;
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_private_key_name(&name) {
                continue;
            }

            let modified_at = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            keys.push(KeyInfo {
                key_type: KeyType::from_name(&name),
                has_public_key: self.dir.join(format!("{name}.pub")).is_file(),
                modified_at,
                name,
            });
        }

        keys.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = keys.len(), dir = ?self.dir, "listed keys");
        Ok(keys)
    }

    /// Store an uploaded private key under the sanitized basename of
    /// `filename`, owner-read/write only. Returns the stored name.
    pub fn upload(&self, filename: &str, content: &[u8]) -> Result<String> {
        let name = basename(filename);
        if name.is_empty() || name == "." || name == ".." {
            return Err(Error::Validation(format!("invalid key filename {filename:?}")));
        }

        let dest = self.dir.join(&name);
        fs::write(&dest, content)
            .map_err(|e| Error::Persistence(format!("write key {:?}: {e}", dest)))?;
        let _ = fs::set_permissions(&dest, fs::Permissions::from_mode(0o600));

        info!(name = %name, "uploaded key");
        Ok(name)
    }

    /// Remove a private key and, best-effort, its public companion.
    pub fn delete(&self, name: &str) -> Result<()> {
        let name = basename(name);
        if name.is_empty() || name == "." || name == ".." {
            return Err(Error::Validation(format!("invalid key name {name:?}")));
        }

        let priv_path = self.dir.join(&name);
        if !priv_path.is_file() {
            return Err(Error::NotFound(format!("key {name:?}")));
        }

        fs::remove_file(&priv_path)
            .map_err(|e| Error::Persistence(format!("remove key {:?}: {e}", priv_path)))?;
        // Companion removal is best-effort
        let _ = fs::remove_file(self.dir.join(format!("{name}.pub")));

        info!(name = %name, "deleted key");
        Ok(())
    }

    /// Content of the `.pub` companion, trimmed.
    pub fn public_key(&self, name: &str) -> Result<String> {
        let pub_path = self.dir.join(format!("{}.pub", basename(name)));
        match fs::read_to_string(&pub_path) {
            Ok(content) => Ok(content.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("public key for {name:?}")))
            }
            Err(e) => Err(Error::Persistence(format!(
                "read public key {:?}: {e}",
                pub_path
            ))),
        }
    }

    /// Generate a new key-pair with `ssh-keygen`, no passphrase.
    ///
    /// Fails before touching the tool if the name or parameters are invalid
    /// or if either half of the pair already exists. On tool failure any
    /// partially written files are removed.
    pub async fn generate(&self, req: &KeygenRequest) -> Result<GeneratedKey> {
        validate_keygen_request(req)?;

        let priv_path = self.dir.join(&req.name);
        let pub_path = self.dir.join(format!("{}.pub", req.name));
        if priv_path.exists() || pub_path.exists() {
            return Err(Error::AlreadyExists(format!("key {:?}", req.name)));
        }

        let hostname = hostname();
        let comment = format!("portway@{} {}", hostname, Utc::now().format("%Y-%m-%d"));
        let args = keygen_args(req, &priv_path, &comment);

        info!(name = %req.name, key_type = req.key_type.as_str(), "generating key");
        let output = tokio::process::Command::new("ssh-keygen")
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::SpawnFailed(format!("run ssh-keygen: {e}")))?;

        if !output.status.success() {
            // Clean up partial files
            let _ = fs::remove_file(&priv_path);
            let _ = fs::remove_file(&pub_path);
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(name = %req.name, status = ?output.status, "ssh-keygen failed");
            return Err(Error::SpawnFailed(format!(
                "ssh-keygen exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let _ = fs::set_permissions(&priv_path, fs::Permissions::from_mode(0o600));
        let _ = fs::set_permissions(&pub_path, fs::Permissions::from_mode(0o644));

        let public_key_content = self.public_key(&req.name)?;
        info!(name = %req.name, "generated key");

        Ok(GeneratedKey {
            private_key: req.name.clone(),
            public_key: format!("{}.pub", req.name),
            public_key_content,
        })
    }
}

/// Final path component of a possibly path-qualified name.
fn basename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether a filename looks like a private key: recognized extension, no
/// extension at all, or the conventional `id_*` prefix.
fn is_private_key_name(name: &str) -> bool {
    if NON_KEY_FILES.contains(&name) || name.ends_with(".pub") {
        return false;
    }
    if name.ends_with(".pem") || name.ends_with(".key") || name.ends_with(".ppk") {
        return true;
    }
    if !name.contains('.') {
        return true;
    }
    name.starts_with("id_")
}

fn validate_keygen_request(req: &KeygenRequest) -> Result<()> {
    let name_pattern = regex_lite::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    if !name_pattern.is_match(&req.name) {
        return Err(Error::Validation(
            "key name may contain only letters, digits, underscore, and dash".into(),
        ));
    }
    match req.key_type {
        KeyType::Rsa => match req.bits {
            Some(bits) if (2048..=4096).contains(&bits) => Ok(()),
            _ => Err(Error::Validation(
                "RSA key bits must be between 2048 and 4096".into(),
            )),
        },
        KeyType::Ed25519 | KeyType::Ecdsa => Ok(()),
        KeyType::Unknown => Err(Error::Validation(
            "key type must be rsa, ed25519, or ecdsa".into(),
        )),
    }
}

/// `ssh-keygen` argument list for a generation request.
fn keygen_args(req: &KeygenRequest, priv_path: &Path, comment: &str) -> Vec<String> {
    let mut args = vec!["-t".to_string(), req.key_type.as_str().to_string()];
    if req.key_type == KeyType::Rsa {
        if let Some(bits) = req.bits {
            args.push("-b".to_string());
            args.push(bits.to_string());
        }
    }
    args.push("-f".to_string());
    args.push(priv_path.to_string_lossy().into_owned());
    args.push("-N".to_string());
    args.push(String::new());
    args.push("-C".to_string());
    args.push(comment.to_string());
    args
}

fn hostname() -> String {
    fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
