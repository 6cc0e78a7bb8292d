// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable storage of the credential collection and the salt.
//!
//! The collection is written as JSON via write-to-temp-then-rename in the
//! target directory, so a crash mid-write leaves either the old or the new
//! file. Both the collection and the salt are owner-only (0600) on Unix.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use credpool_config::model::StorageConfig;
use credpool_core::{CredentialId, VaultError};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::kdf::{Salt, SALT_LEN};
use crate::model::CredentialCollection;

/// Locations of the persisted vault artifacts.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials_path: PathBuf,
    salt_path: PathBuf,
    session_dir: PathBuf,
}

impl CredentialStore {
    pub fn new(
        credentials_path: impl Into<PathBuf>,
        salt_path: impl Into<PathBuf>,
        session_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            salt_path: salt_path.into(),
            session_dir: session_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.credentials_path,
            &config.salt_path,
            &config.session_dir,
        )
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn salt_path(&self) -> &Path {
        &self.salt_path
    }

    /// Whether a salt has been written, i.e. the vault was initialized.
    pub fn is_initialized(&self) -> bool {
        self.salt_path.exists()
    }

    /// Load the credential collection.
    ///
    /// `NotFound` if no store exists yet; `Corrupt` if it cannot be parsed.
    /// No partial recovery is attempted.
    pub fn load(&self) -> Result<CredentialCollection, VaultError> {
        let path = &self.credentials_path;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VaultError::NotFound(format!(
                    "credential store at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(VaultError::io(path, e)),
        };

        let collection: CredentialCollection =
            serde_json::from_slice(&bytes).map_err(|e| VaultError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        collection.validate().map_err(|reason| VaultError::Corrupt {
            path: path.clone(),
            reason,
        })?;

        debug!(path = %path.display(), credentials = collection.len(), "credential store loaded");
        Ok(collection)
    }

    /// Atomically replace the persisted collection.
    pub fn save(&self, collection: &CredentialCollection) -> Result<(), VaultError> {
        let bytes = serde_json::to_vec_pretty(collection).map_err(|e| VaultError::Corrupt {
            path: self.credentials_path.clone(),
            reason: format!("failed to serialize collection: {e}"),
        })?;
        atomic_write(&self.credentials_path, &bytes)
            .map_err(|e| VaultError::io(&self.credentials_path, e))?;
        debug!(path = %self.credentials_path.display(), credentials = collection.len(), "credential store saved");
        Ok(())
    }

    /// [`save`](Self::save) on the blocking pool. Serialization happens on the
    /// caller's thread so the collection need not be moved.
    pub async fn persist(&self, collection: &CredentialCollection) -> Result<(), VaultError> {
        let bytes = serde_json::to_vec_pretty(collection).map_err(|e| VaultError::Corrupt {
            path: self.credentials_path.clone(),
            reason: format!("failed to serialize collection: {e}"),
        })?;
        let path = self.credentials_path.clone();
        let count = collection.len();
        tokio::task::spawn_blocking(move || {
            atomic_write(&path, &bytes).map_err(|e| VaultError::io(&path, e))?;
            debug!(path = %path.display(), credentials = count, "credential store saved");
            Ok::<(), VaultError>(())
        })
        .await
        .map_err(|e| VaultError::io(&self.credentials_path, io::Error::other(e)))?
    }

    /// Read the salt. `NotFound` if the vault was never initialized.
    pub fn read_salt(&self) -> Result<Salt, VaultError> {
        let path = &self.salt_path;
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VaultError::NotFound(format!("vault salt at {}", path.display())));
            }
            Err(e) => return Err(VaultError::io(path, e)),
        };
        let mut bytes = Vec::with_capacity(SALT_LEN);
        file.read_to_end(&mut bytes)
            .map_err(|e| VaultError::io(path, e))?;
        Salt::from_slice(&bytes).ok_or_else(|| VaultError::Corrupt {
            path: path.clone(),
            reason: format!("expected {SALT_LEN} salt bytes, found {}", bytes.len()),
        })
    }

    /// Write the salt exactly once. `AlreadyInitialized` if one exists.
    pub fn write_salt(&self, salt: &Salt) -> Result<(), VaultError> {
        let path = &self.salt_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = match options.open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(VaultError::AlreadyInitialized(path.clone()));
            }
            Err(e) => return Err(VaultError::io(path, e)),
        };
        file.write_all(salt.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| VaultError::io(path, e))?;

        info!(path = %path.display(), "vault salt written");
        Ok(())
    }

    /// Where the automation layer keeps session state for `id`.
    pub fn session_artifact_path(&self, id: &CredentialId) -> PathBuf {
        self.session_dir.join(format!("{id}.json"))
    }

    /// Delete the session artifact for `id`, if any. Returns whether one existed.
    pub fn remove_session_artifact(&self, id: &CredentialId) -> Result<bool, VaultError> {
        let path = self.session_artifact_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id = %id, "session artifact removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VaultError::io(path, e)),
        }
    }
}

/// Write `data` to a temp file beside `path`, fsync, restrict permissions,
/// then rename over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    restrict_permissions(temp.path())?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    sync_dir(parent)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Fsync the directory so the rename itself is durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::test_params;
    use crate::model::tests::test_key;
    use crate::model::NewCredential;
    use chrono::Utc;
    use secrecy::{ExposeSecret, SecretString};
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> CredentialStore {
        CredentialStore::new(
            dir.join("credentials.json"),
            dir.join(".salt"),
            dir.join("sessions"),
        )
    }

    #[test]
    fn load_missing_store_is_not_found() {
        let dir = tempdir().unwrap();
        let err = store_in(dir.path()).load().unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn save_then_load_preserves_credentials() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let key = test_key();
        let mut collection = CredentialCollection::new(&key, test_params()).unwrap();
        let id = collection
            .add(
                NewCredential::new("13800000001", SecretString::from("pw".to_string()))
                    .with_phone("13800000001"),
                Some(&key),
                Utc::now(),
            )
            .unwrap();

        store.save(&collection).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&id).unwrap().phone(), Some("13800000001"));
        assert_eq!(loaded.get_secret(&id, Some(&key)).unwrap().expose_secret(), "pw");

        // Metadata stays cleartext, the secret does not.
        let raw = fs::read_to_string(store.credentials_path()).unwrap();
        assert!(raw.contains("13800000001"));
        assert!(!raw.contains("\"pw\""));
    }

    #[tokio::test]
    async fn persist_matches_save() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let key = test_key();
        let mut collection = CredentialCollection::new(&key, test_params()).unwrap();
        let id = collection
            .add(
                NewCredential::new("a", SecretString::from("pw".to_string())),
                Some(&key),
                Utc::now(),
            )
            .unwrap();

        store.persist(&collection).await.unwrap();
        assert!(store.load().unwrap().get(&id).is_some());
    }

    #[test]
    fn garbage_store_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.credentials_path(), b"{ not json").unwrap();
        assert!(matches!(store.load(), Err(VaultError::Corrupt { .. })));
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let key = test_key();
        let collection = CredentialCollection::new(&key, test_params()).unwrap();
        store.save(&collection).unwrap();
        store.save(&collection).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn salt_is_written_once() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(!store.is_initialized());

        let salt = Salt::generate().unwrap();
        store.write_salt(&salt).unwrap();
        assert!(store.is_initialized());
        assert_eq!(store.read_salt().unwrap(), salt);

        let err = store.write_salt(&Salt::generate().unwrap()).unwrap_err();
        assert!(matches!(err, VaultError::AlreadyInitialized(_)));
        assert_eq!(store.read_salt().unwrap(), salt);
    }

    #[test]
    fn truncated_salt_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.salt_path(), [0u8; 4]).unwrap();
        assert!(matches!(store.read_salt(), Err(VaultError::Corrupt { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn persisted_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let key = test_key();
        store
            .save(&CredentialCollection::new(&key, test_params()).unwrap())
            .unwrap();
        store.write_salt(&Salt::generate().unwrap()).unwrap();

        for path in [store.credentials_path(), store.salt_path()] {
            let mode = fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{} has mode {:o}", path.display(), mode);
        }
    }

    #[test]
    fn session_artifacts_are_removed() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let id = CredentialId::from("acc_001");
        let path = store.session_artifact_path(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{}").unwrap();

        assert!(store.remove_session_artifact(&id).unwrap());
        assert!(!path.exists());
        assert!(!store.remove_session_artifact(&id).unwrap());
    }
}
