use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::storage;

/// The newest news entry. Every field is already HTML-escaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub entry_id: String,
    pub entry_date: String,
    pub entry_title: String,
    pub entry_doc: String,
}

/// The last entry users were notified about.
pub struct EntryStore {
    path: PathBuf,
}

impl EntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<EntryRecord>> {
        storage::read_json(&self.path)
    }

    pub fn save(&self, entry: &EntryRecord) -> Result<()> {
        storage::write_json(&self.path, entry)
    }
}
