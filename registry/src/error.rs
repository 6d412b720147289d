use crate::boundary::ServiceError;
use burrow_patcher::PatchError;
use burrow_scanner::ScanError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("does not exist: {0}")]
    NotExist(String),

    #[error("all container slots are taken")]
    Full,

    #[error("unexpected value for {key}: expected {expected}, got {actual}")]
    Mismatch {
        key: String,
        expected: &'static str,
        actual: String,
    },

    #[error("failed to create directory {path}: {source}")]
    DirMake {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings parse error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("marshal error: {0}")]
    Marshal(#[from] serde_json::Error),

    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("external service error: {0}")]
    External(#[from] ServiceError),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
