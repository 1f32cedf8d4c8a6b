use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{config, error::AuthError, types::CredentialRecord, utils};

pub const CREDENTIAL_FORMAT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CREDENTIAL_FORMAT_VERSION
}

/// On-disk envelope. Files written before versioning load as version 1.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(flatten)]
    record: CredentialRecord,
}

/// One JSON file per identity under a single directory.
pub struct CredentialStore {
    dir: PathBuf,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::with_dir(config::data_dir().join("credentials"))
    }

    /// Create a store rooted at a specific directory (useful for testing).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(utils::identity_file_name(identity))
    }

    /// Reads the record for `identity`. Missing, unreadable or corrupt files
    /// all yield `None`.
    pub async fn load(&self, identity: &str) -> Option<CredentialRecord> {
        let path = self.path_for(identity);
        let content = match async_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                debug!(identity, error = %e, "no readable credential record");
                return None;
            }
        };

        match serde_json::from_str::<StoredCredential>(&content) {
            Ok(stored) if stored.version <= CREDENTIAL_FORMAT_VERSION => Some(stored.record),
            Ok(stored) => {
                warn!(
                    identity,
                    version = stored.version,
                    "credential record written by a newer format, ignoring"
                );
                None
            }
            Err(e) => {
                warn!(identity, path = %path.display(), error = %e, "corrupt credential record, ignoring");
                None
            }
        }
    }

    /// Replaces the record for `identity` atomically.
    ///
    /// The record goes to a temp file in the same directory which is then
    /// renamed over the old one, so readers see either the old or the new
    /// record and never a partial write.
    pub async fn save(&self, identity: &str, record: &CredentialRecord) -> Result<(), AuthError> {
        let lock = self.write_lock(identity);
        let _guard = lock.lock().await;

        async_fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_failure(&self.dir, e))?;

        let stored = StoredCredential {
            version: CREDENTIAL_FORMAT_VERSION,
            record: record.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| AuthError::StorageFailure(e.to_string()))?;

        let path = self.path_for(identity);
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            utils::identity_file_name(identity),
            utils::random_suffix(8)
        ));

        if let Err(e) = write_then_rename(&tmp, &path, json.as_bytes()).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(storage_failure(&path, e));
        }

        debug!(identity, path = %path.display(), "credential record saved");
        Ok(())
    }

    /// Removes the record for `identity`. Removing an absent record succeeds.
    pub async fn delete(&self, identity: &str) -> Result<(), AuthError> {
        let lock = self.write_lock(identity);
        let _guard = lock.lock().await;

        let path = self.path_for(identity);
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_failure(&path, e)),
        }
    }

    fn write_lock(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Entries only the map still references are idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(identity.to_string()).or_default())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    async_fs::write(tmp, bytes).await?;

    // Set file permissions to 0600 on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        async_fs::set_permissions(tmp, std::fs::Permissions::from_mode(0o600)).await?;
    }

    async_fs::rename(tmp, path).await
}

fn storage_failure(path: &Path, e: std::io::Error) -> AuthError {
    AuthError::StorageFailure(format!("{}: {}", path.display(), e))
}
