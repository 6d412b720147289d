use burrow_executor::ExecutorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patch tool failed: {0}")]
    Tool(#[from] ExecutorError),
}
