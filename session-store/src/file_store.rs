//! JSON file store
//!
//! # Layout
//!
//! - `<data_dir>/<session_id>.json` - one pretty-printed session per file
//! - `<data_dir>/backup/` - quarantined files that failed to load
//!
//! All sessions are mirrored in memory. Files that fail to parse or validate
//! on open are moved to `backup/<file>.<unix_millis>.bak` instead of aborting
//! the open; when even the move fails the file is left in place and skipped.
//! Writes go to a temp file first and are renamed into place.

use crate::{
    error::{Error, Result},
    storage::SessionStore,
    types::{Session, SessionId},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Quarantine directory name
const BACKUP_DIR: &str = "backup";

/// Session file extension
const EXTENSION: &str = "json";

/// File-backed session store
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    sessions: DashMap<SessionId, Session>,
    quarantined: Vec<PathBuf>,
}

impl FileStore {
    /// Open or create a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut store = Self {
            dir,
            sessions: DashMap::new(),
            quarantined: Vec::new(),
        };
        store.load_all()?;

        tracing::info!(
            dir = ?store.dir,
            sessions = store.sessions.len(),
            quarantined = store.quarantined.len(),
            "Opened session store"
        );

        Ok(store)
    }

    /// Files moved to quarantine while opening
    pub fn quarantined(&self) -> &[PathBuf] {
        &self.quarantined
    }

    /// Path of the file holding `id`
    pub fn session_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, EXTENSION))
    }

    fn load_all(&mut self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }

            match Self::load_file(&path) {
                Ok(session) => {
                    self.sessions.insert(session.id.clone(), session);
                }
                Err(e) => {
                    tracing::error!(path = ?path, error = %e, "Invalid session file, quarantining");
                    match self.quarantine(&path) {
                        Ok(moved) => self.quarantined.push(moved),
                        Err(e) => {
                            tracing::error!(path = ?path, error = %e, "Failed to move file to backup, skipping");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn load_file(path: &Path) -> Result<Session> {
        let data = fs::read_to_string(path)?;
        let session: Session = serde_json::from_str(&data)?;
        session.validate()?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != session.id.as_str() {
            return Err(Error::InvalidRecord(format!(
                "file name {} does not match session id {}",
                stem, session.id
            )));
        }

        Ok(session)
    }

    fn quarantine(&self, path: &Path) -> Result<PathBuf> {
        let backup_dir = self.dir.join(BACKUP_DIR);
        fs::create_dir_all(&backup_dir)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("session");
        let destination = backup_dir.join(format!(
            "{}.{}.bak",
            file_name,
            Utc::now().timestamp_millis()
        ));

        fs::rename(path, &destination)?;
        tracing::warn!(destination = ?destination, "Moved invalid session file to backup");

        Ok(destination)
    }

    fn write_file(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.id);
        let tmp = path.with_extension("json.tmp");

        let data = serde_json::to_string_pretty(session)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(session_id = %session.id, "Session written");
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    fn put(&self, session: &Session) -> Result<()> {
        session.validate()?;
        self.write_file(session)?;
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, id: &SessionId) -> Result<bool> {
        let existed = self.sessions.remove(id).is_some();

        let path = self.session_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(session_id = %id, error = %e, "Failed to delete session file");
                return Err(e.into());
            }
        }

        Ok(existed)
    }

    fn list(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.iter().map(|s| s.value().clone()).collect())
    }

    fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.created_at < cutoff)
            .map(|s| s.key().clone())
            .collect())
    }
}
