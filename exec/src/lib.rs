mod client;
mod error;
mod server;

pub use client::{ExecClient, ExecHandle};
pub use error::ExecError;
pub use server::{
    bind_control_port, serve_with_shutdown, ExecServiceGrpc, CONTROL_PORT_FIRST, CONTROL_PORT_LAST,
};
