//! File-backed `SessionStore`.

use async_trait::async_trait;
use std::path::PathBuf;

use sentimental_core::Result;
use sentimental_core::session::{Session, SessionStore};

use crate::dto::SessionDTO;
use crate::paths::SentimentalPaths;
use crate::storage::AtomicTomlFile;

/// Keeps the signed-in session in `session.toml`.
///
/// The store persists whatever it is given; deciding whether a cached id
/// is usable is the controller's job.
pub struct FileSessionStore {
    file: AtomicTomlFile<SessionDTO>,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Store at `<config_dir>/session.toml`.
    pub fn from_paths(paths: &SentimentalPaths) -> Result<Self> {
        Ok(Self::new(paths.session_file()?))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let session = self.file.load()?.map(Session::from);
        tracing::debug!(
            "Loaded cached session from {}: {}",
            self.file.path().display(),
            session.is_some()
        );
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.file.save(&SessionDTO::from(session))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.file.remove()?;
        Ok(())
    }
}
