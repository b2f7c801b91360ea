use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

/// A logged-in staff session as persisted by the CLI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Backend the token was issued by.
    pub api_url: String,
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    /// `~/.staffdesk/session.json`, falling back to the working directory.
    #[allow(deprecated)]
    pub fn default_location() -> Self {
        let home = std::env::home_dir().unwrap_or_else(|| PathBuf::from("."));
        SessionStore::new(home.join(".staffdesk").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Session>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("no session at {}", self.path.display());
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read `{}`", self.path.display()))?;
        let session = serde_json::from_str(&json)
            .with_context(|| format!("failed to deserialize `{}`", self.path.display()))?;
        Ok(Some(session))
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json)
            .await
            .with_context(|| format!("failed to write `{}`", self.path.display()))?;
        info!("session saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored session. Clearing an absent session is not an error.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove `{}`", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> SessionStore {
        let dir = std::env::temp_dir().join(format!(
            "staffdesk_session_{}_{}",
            name,
            std::process::id()
        ));
        SessionStore::new(dir.join("session.json"))
    }

    #[tokio::test]
    async fn save_load_clear() {
        let store = scratch("roundtrip");
        assert_eq!(store.load().await.unwrap(), None);

        let session = Session {
            token: "t0k3n".into(),
            api_url: "http://localhost:4000".into(),
        };
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_session_is_an_error() {
        let store = scratch("corrupt");
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.load().await.is_err());
        store.clear().await.unwrap();
    }
}
