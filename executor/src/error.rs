use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with code {code}: {output}")]
    NonZeroExit {
        command: String,
        code: i32,
        output: String,
    },

    #[error("process {pid} exceeded its {limit:?} deadline and was killed")]
    Timeout { pid: u32, limit: Duration },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
