//! Session persisted between invocations

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use surveyor_types::Session;
use tempfile::NamedTempFile;

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `session.json` under the platform data directory
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("no user data directory found; pass --session-file"))?;
        Ok(Self::new(dir.join("surveyor").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file means signed out. A corrupt one is discarded.
    pub fn load(&self) -> Result<Option<Session>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    /// Written owner-only (0600 on unix) and swapped in atomically
    pub fn save(&self, session: &Session) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;

        let json = serde_json::to_string_pretty(session)?;
        let mut file = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp file in {}", parent.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("writing {}", self.path.display()))?;
        file.persist(&self.path)
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing {}", self.path.display())),
        }
    }

    /// Write the current session, or remove the file when there is none
    pub fn sync(&self, session: Option<&Session>) -> Result<()> {
        match session {
            Some(session) => self.save(session),
            None => self.clear(),
        }
    }
}
