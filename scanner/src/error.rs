use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("stat failed for {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("walk cancelled")]
    Cancelled,
}
