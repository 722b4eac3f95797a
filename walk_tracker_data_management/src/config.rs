use std::path::{Path, PathBuf};

use crate::DATABASE_PATH;

/// Where the walk store keeps its data.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    File(PathBuf),
    /// Private database living for as long as the store. Used by tests.
    InMemory,
}

impl StoreConfig {
    pub fn file(path: impl AsRef<Path>) -> Self {
        StoreConfig::File(path.as_ref().to_path_buf())
    }

    pub fn database_path(&self) -> Option<&Path> {
        match self {
            StoreConfig::File(path) => Some(path),
            StoreConfig::InMemory => None,
        }
    }
}

impl Default for StoreConfig {
    /// `data/walks.db` under the project root, or under the working directory when there is no project root.
    fn default() -> Self {
        let root = project_root::get_project_root().unwrap_or_else(|_| PathBuf::from("."));
        StoreConfig::File(root.join(DATABASE_PATH))
    }
}
