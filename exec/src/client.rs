use crate::error::ExecError;
use async_trait::async_trait;
use burrow_core::exec_service_client::ExecServiceClient;
use burrow_core::{ExecReply, ExecRequest};
use burrow_executor::CommandSpec;
use burrow_registry::{SandboxLauncher, ServiceError};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tonic::transport::Channel;
use uuid::Uuid;

/// Client side of the exec protocol. A call returns immediately with a
/// handle for the in-flight request.
#[derive(Clone)]
pub struct ExecClient {
    inner: ExecServiceClient<Channel>,
}

impl ExecClient {
    pub async fn connect(addr: String) -> Result<Self, ExecError> {
        Ok(Self {
            inner: ExecServiceClient::connect(addr).await?,
        })
    }

    /// Issues one request and returns its completion handle. Exactly one
    /// reply is produced per request; transport failures are not retried.
    pub fn call(&self, request: ExecRequest) -> ExecHandle {
        let mut client = self.inner.clone();
        let task = tokio::spawn(async move {
            client
                .exec(request)
                .await
                .map(|response| response.into_inner())
                .map_err(ExecError::Rpc)
        });
        ExecHandle { task }
    }
}

/// An in-flight exec call. Await it for the reply, or check `is_finished`
/// to poll without blocking on unrelated work.
pub struct ExecHandle {
    task: JoinHandle<Result<ExecReply, ExecError>>,
}

impl ExecHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for ExecHandle {
    type Output = Result<ExecReply, ExecError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task)
            .poll(cx)
            .map(|joined| joined.unwrap_or_else(|e| Err(ExecError::Aborted(e.to_string()))))
    }
}

#[async_trait]
impl SandboxLauncher for ExecClient {
    async fn launch(&self, spec: CommandSpec) -> Result<u32, ServiceError> {
        let request = ExecRequest {
            uid: Uuid::new_v4().to_string(),
            timeout_ms: spec.timeout.map(|t| t.as_millis() as u64).unwrap_or(0),
            cmd: spec.command,
            env: spec.env,
            dir: spec
                .dir
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
            args: spec.args,
        };

        let reply = self
            .call(request)
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(reply.pid)
    }
}
