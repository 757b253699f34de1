use crate::errors::StoreError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, warn};

pub const TOKEN_KEY: &str = "token";

/// Small persistent key-value store kept as a JSON object on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SessionStore {
    /// Opens the store. A missing file is an empty store; an unreadable or
    /// corrupt one is logged and treated as empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    error!("failed to parse session store {}: {err}", path.display());
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                error!("failed to read session store {}: {err}", path.display());
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist().await
    }

    pub async fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(&self.path, payload).await?;
        Ok(())
    }
}

/// The bearer token of the signed-in user, mirrored into the store.
#[derive(Debug, Clone)]
pub struct Session {
    token: Option<String>,
    store: SessionStore,
}

impl Session {
    /// Reads the token once from the store.
    pub fn new(store: SessionStore) -> Self {
        let token = store.get(TOKEN_KEY).map(str::to_string);
        Self { token, store }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub async fn sign_in(&mut self, token: String) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, &token).await?;
        self.token = Some(token);
        Ok(())
    }

    /// Forgets the token. The in-memory token is always cleared; a store
    /// failure is logged.
    pub async fn clear(&mut self) {
        self.token = None;
        if let Err(err) = self.store.remove(TOKEN_KEY).await {
            warn!("failed to remove token from {}: {err}", self.store.path().display());
        }
    }
}
