//! File-backed map of city names to administrative codes.

use crate::errors::GateflowError;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A JSON file of `city name -> code`, loaded eagerly and saved on every miss.
///
/// The cache is not locked: concurrent writers to the same file may race, and
/// the last save wins.
#[derive(Debug, Clone)]
pub struct CityCodeCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl CityCodeCache {
    /// Loads the cache at `path`. A missing or unreadable file gives an empty cache.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt city code cache");
                BTreeMap::new()
            }),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No city code cache yet");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached code for `city`.
    #[must_use]
    pub fn get(&self, city: &str) -> Option<&str> {
        self.entries.get(city).map(String::as_str)
    }

    /// Inserts or replaces a code in memory.
    pub fn insert(&mut self, city: impl Into<String>, code: impl Into<String>) {
        self.entries.insert(city.into(), code.into());
    }

    /// Number of cached cities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the cache as pretty JSON, keeping non-ASCII names readable.
    ///
    /// # Errors
    ///
    /// Returns an IO or serialization error; callers may choose to ignore it.
    pub fn save(&self) -> Result<(), GateflowError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    /// Returns the code for `city`, asking `resolver` on a miss.
    ///
    /// A resolved code is cached and saved; a failed save is logged and does
    /// not affect the result. `None` from the resolver is not cached.
    pub async fn resolve<F, Fut>(&mut self, city: &str, resolver: F) -> Option<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        let resolved = self
            .try_resolve(city, |name| async move { Ok::<_, Infallible>(resolver(name).await) })
            .await;
        match resolved {
            Ok(code) => code,
            Err(never) => match never {},
        }
    }

    /// Like [`resolve`](Self::resolve), for resolvers that can fail.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error; nothing is cached in that case.
    pub async fn try_resolve<F, Fut, E>(&mut self, city: &str, resolver: F) -> Result<Option<String>, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
    {
        if let Some(code) = self.get(city) {
            debug!(city, code, "City code cache hit");
            return Ok(Some(code.to_string()));
        }

        let Some(code) = resolver(city.to_string()).await? else {
            return Ok(None);
        };
        self.insert(city, code.clone());
        if let Err(e) = self.save() {
            warn!(path = %self.path.display(), error = %e, "Failed to save city code cache");
        }
        Ok(Some(code))
    }
}
