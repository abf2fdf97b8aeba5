//! Durable per-identity credential persistence.
//!
//! Credentials for every identity live in one JSON file under the config
//! directory. All access goes through a single async mutex: expected load
//! is single-digit concurrent tool calls, so one lock is enough to keep
//! two refreshes for the same identity from racing stale data over fresh.
//!
//! Writes go to a temp file that is renamed over the target, so a failed
//! write never leaves a truncated credential file behind. Token material
//! is a secret: the file is written `0600` and the directory `0700`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::auth::types::Credential;
use crate::error::AuthError;

const STORE_VERSION: u32 = 1;

/// On-disk credential records, keyed by identity (account email)
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    version: u32,

    #[serde(default)]
    identities: BTreeMap<String, Credential>,
}

/// File-backed credential store
pub struct CredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CredentialStore {
    /// Create a store backed by the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Look up the credential stored for an identity.
    pub async fn get(&self, identity: &str) -> Result<Option<Credential>, AuthError> {
        let _guard = self.lock.lock().await;
        let file = self.read_file().await?;
        Ok(file.identities.get(identity).cloned())
    }

    /// Store a credential for an identity, overwriting any prior one
    /// (last-writer-wins; no merge semantics).
    pub async fn save(&self, identity: &str, credential: Credential) -> Result<(), AuthError> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        file.version = STORE_VERSION;
        file.identities.insert(identity.to_string(), credential);
        self.write_file(&file).await
    }

    /// Remove the credential for an identity.
    ///
    /// Returns `true` when a credential was removed.
    pub async fn delete(&self, identity: &str) -> Result<bool, AuthError> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        let removed = file.identities.remove(identity).is_some();
        if removed {
            self.write_file(&file).await?;
        }
        Ok(removed)
    }

    /// All stored identities with their credentials.
    pub async fn identities(&self) -> Result<Vec<(String, Credential)>, AuthError> {
        let _guard = self.lock.lock().await;
        let file = self.read_file().await?;
        Ok(file.identities.into_iter().collect())
    }

    async fn read_file(&self) -> Result<CredentialFile, AuthError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| AuthError::Storage {
                message: format!("failed to parse {}: {}", self.path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CredentialFile::default()),
            Err(e) => Err(AuthError::Storage {
                message: format!("failed to read {}: {}", self.path.display(), e),
            }),
        }
    }

    async fn write_file(&self, file: &CredentialFile) -> Result<(), AuthError> {
        let content = serde_json::to_string_pretty(file).map_err(|e| AuthError::Storage {
            message: format!("failed to serialize credential store: {}", e),
        })?;

        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent).await?;
        }

        // Write-then-rename keeps a crashed write from truncating the store.
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content.as_bytes())
            .await
            .map_err(|e| AuthError::Storage {
                message: format!("failed to write {}: {}", tmp_path.display(), e),
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| AuthError::Storage {
                    message: format!("failed to set permissions on {}: {}", tmp_path.display(), e),
                })?;
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| AuthError::Storage {
                message: format!("failed to replace {}: {}", self.path.display(), e),
            })
    }
}

async fn ensure_private_dir(dir: &Path) -> Result<(), AuthError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AuthError::Storage {
            message: format!("failed to create {}: {}", dir.display(), e),
        })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await;
    }
    Ok(())
}
