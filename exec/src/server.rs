use crate::error::ExecError;
use burrow_core::exec_service_server::{ExecService, ExecServiceServer};
use burrow_core::{ExecReply, ExecRequest};
use burrow_executor::{CommandSpec, ExecutorError, ProcessExecutor};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// Control-plane port range, kept apart from anything a container binds.
pub const CONTROL_PORT_FIRST: u16 = 42700;
pub const CONTROL_PORT_LAST: u16 = 42763;

/// Server side of the exec protocol. Stateless: each accepted call is
/// dispatched on its own task by the runtime and answered exactly once.
#[derive(Default)]
pub struct ExecServiceGrpc {
    executor: ProcessExecutor,
}

impl ExecServiceGrpc {
    pub fn new() -> Self {
        Self {
            executor: ProcessExecutor::new(),
        }
    }
}

#[tonic::async_trait]
impl ExecService for ExecServiceGrpc {
    async fn exec(&self, request: Request<ExecRequest>) -> Result<Response<ExecReply>, Status> {
        let req = request.into_inner();

        if req.cmd.is_empty() {
            return Err(Status::invalid_argument("cmd is required"));
        }

        let spec = CommandSpec {
            command: req.cmd,
            args: req.args,
            env: req.env,
            dir: if req.dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(req.dir))
            },
            // A zero timeout means the process may run unbounded.
            timeout: (req.timeout_ms > 0).then(|| Duration::from_millis(req.timeout_ms)),
        };

        tracing::debug!(uid = %req.uid, command = %spec.command, "dispatching exec request");

        let execution = self
            .executor
            .run_with_context(spec)
            .await
            .map_err(into_status)?;

        tracing::debug!(
            uid = %req.uid,
            pid = execution.pid,
            output_bytes = execution.output.len(),
            "exec request finished"
        );

        Ok(Response::new(ExecReply {
            uid: req.uid,
            pid: execution.pid,
        }))
    }
}

fn into_status(e: ExecutorError) -> Status {
    match e {
        ExecutorError::Timeout { .. } => Status::deadline_exceeded(e.to_string()),
        ExecutorError::Spawn { .. } => Status::not_found(e.to_string()),
        ExecutorError::NonZeroExit { .. } => Status::failed_precondition(e.to_string()),
        ExecutorError::Io(_) => Status::internal(e.to_string()),
    }
}

/// Binds the first free port in the control-plane range.
pub async fn bind_control_port(host: &str) -> Result<(TcpListener, u16), ExecError> {
    for port in CONTROL_PORT_FIRST..=CONTROL_PORT_LAST {
        if let Ok(listener) = TcpListener::bind((host, port)).await {
            tracing::info!(port, "exec service listening");
            return Ok((listener, port));
        }
    }
    Err(ExecError::NoFreePort {
        first: CONTROL_PORT_FIRST,
        last: CONTROL_PORT_LAST,
    })
}

/// Serves the exec service until `shutdown` resolves. The caller owns the
/// server's lifetime; there is no detached background listener.
pub async fn serve_with_shutdown<F>(listener: TcpListener, shutdown: F) -> Result<(), ExecError>
where
    F: Future<Output = ()>,
{
    Server::builder()
        .add_service(ExecServiceServer::new(ExecServiceGrpc::new()))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    Ok(())
}
