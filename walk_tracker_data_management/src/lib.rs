use const_format::concatcp;

pub mod config;
pub mod database;
mod gpx_util;
mod walk_store;

pub use config::StoreConfig;
pub use gpx_util::default_export_path;
pub use walk_store::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "walks.db");
pub const GPX_EXPORT_DIR: &str = concatcp!(DATA_DIR, "gpx");

/// Number of walks returned by `get_recent_walks` when the caller has no preference.
pub const DEFAULT_RECENT_LIMIT: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum WalkStoreError {
    #[error("Walk store used before init")]
    NotInitialized,
    #[error("Failed to open database: {0}")]
    Open(String),
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Read failed: {0}")]
    ReadFailed(String),
    #[error("Refusing to save an empty batch of route points")]
    EmptyBatch,
    #[error("No walk with id {0}")]
    WalkNotFound(i64),
    #[error("GPX export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
