use burrow_core::burrow_server::Burrow;
use burrow_core::{HealthCheckRequest, HealthCheckResponse};
use tonic::{Request, Response, Status};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Default)]
pub struct BurrowService;

#[tonic::async_trait]
impl Burrow for BurrowService {
    async fn health_check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let response = HealthCheckResponse {
            healthy: true,
            version: VERSION.to_string(),
        };
        Ok(Response::new(response))
    }
}
