use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("no free control port in {first}..={last}")]
    NoFreePort { first: u16, last: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("call aborted: {0}")]
    Aborted(String),
}
