//! Persisted authentication cookies.
//!
//! The cookie file's modification time doubles as the freshness timestamp:
//! a session older than the configured lifetime, or an empty/missing file,
//! forces a new login before the next page fetch.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::Result;
use crate::storage;

/// Cookie name to value, replaced wholesale on every login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieSet(BTreeMap<String, String>);

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Takes every cookie of `other`, replacing same-named ones.
    pub fn merge(&mut self, other: CookieSet) {
        self.0.extend(other.0);
    }

    /// Parses a `Cookie` request header value (`a=1; b=2`).
    pub fn from_header(header: &str) -> Self {
        let mut cookies = Self::new();
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if !name.is_empty() {
                    cookies.insert(name.trim(), value.trim());
                }
            }
        }
        cookies
    }

    /// Renders the set as a `Cookie` request header value.
    pub fn to_header(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct SessionStore {
    path: PathBuf,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, lifetime: Duration) -> Self {
        Self {
            path: path.into(),
            lifetime,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last write time of a non-empty cookie file.
    pub fn modified_at(&self) -> Result<Option<DateTime<Utc>>> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if meta.len() == 0 {
            return Ok(None);
        }
        Ok(Some(DateTime::<Utc>::from(meta.modified()?)))
    }

    pub fn is_fresh(&self) -> Result<bool> {
        self.is_fresh_at(Utc::now())
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(modified) = self.modified_at()? else {
            debug!(path = %self.path.display(), "Cookie file missing or empty");
            return Ok(false);
        };
        let age = (now - modified).to_std().unwrap_or_default();
        Ok(age <= self.lifetime)
    }

    pub fn load(&self) -> Result<Option<CookieSet>> {
        storage::read_json(&self.path)
    }

    pub fn save(&self, cookies: &CookieSet) -> Result<()> {
        storage::write_json(&self.path, cookies)?;
        debug!(count = cookies.len(), "Session cookies saved");
        Ok(())
    }
}
