use burrow_core::container_service_server::ContainerService as GrpcContainerService;
use burrow_core::{
    ContainerInfo, CreateContainerRequest, CreateContainerResponse, DestroyContainerRequest,
    DestroyContainerResponse, ImageTagsRequest, ImageTagsResponse, InspectContainerRequest,
    InspectContainerResponse, ListContainersRequest, ListContainersResponse, RunContainerRequest,
    RunContainerResponse,
};
use burrow_exec::ExecClient;
use burrow_registry::{Container, CreateParams, Registry, RegistryError};
use std::path::PathBuf;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct ContainerServiceGrpc {
    registry: Arc<Registry>,
    launcher: ExecClient,
}

impl ContainerServiceGrpc {
    pub fn new(registry: Arc<Registry>, launcher: ExecClient) -> Self {
        Self { registry, launcher }
    }
}

#[tonic::async_trait]
impl GrpcContainerService for ContainerServiceGrpc {
    async fn create_container(
        &self,
        request: Request<CreateContainerRequest>,
    ) -> Result<Response<CreateContainerResponse>, Status> {
        let req = request.into_inner();

        if req.image.is_empty() {
            return Err(Status::invalid_argument("image is required"));
        }
        if req.image_name.is_empty() {
            return Err(Status::invalid_argument("image_name is required"));
        }

        let params = CreateParams {
            image: PathBuf::from(req.image),
            image_name: req.image_name,
            name: if req.name.is_empty() {
                None
            } else {
                Some(req.name)
            },
            user: req.user,
        };

        let container = self
            .registry
            .create_container(params)
            .await
            .map_err(into_status)?;

        Ok(Response::new(CreateContainerResponse {
            container: Some(container_to_grpc(container)),
        }))
    }

    async fn run_container(
        &self,
        request: Request<RunContainerRequest>,
    ) -> Result<Response<RunContainerResponse>, Status> {
        let req = request.into_inner();

        if req.container_id.is_empty() {
            return Err(Status::invalid_argument("container_id is required"));
        }

        let container = self
            .registry
            .run_container(&req.container_id, &self.launcher)
            .await
            .map_err(into_status)?;

        Ok(Response::new(RunContainerResponse {
            container: Some(container_to_grpc(container)),
        }))
    }

    async fn destroy_container(
        &self,
        request: Request<DestroyContainerRequest>,
    ) -> Result<Response<DestroyContainerResponse>, Status> {
        let req = request.into_inner();

        if req.container_id.is_empty() {
            return Err(Status::invalid_argument("container_id is required"));
        }

        self.registry
            .destroy_container(&req.container_id)
            .await
            .map_err(into_status)?;

        Ok(Response::new(DestroyContainerResponse {}))
    }

    async fn list_containers(
        &self,
        _request: Request<ListContainersRequest>,
    ) -> Result<Response<ListContainersResponse>, Status> {
        let containers = self.registry.list().await;

        Ok(Response::new(ListContainersResponse {
            containers: containers.into_iter().map(container_to_grpc).collect(),
        }))
    }

    async fn inspect_container(
        &self,
        request: Request<InspectContainerRequest>,
    ) -> Result<Response<InspectContainerResponse>, Status> {
        let req = request.into_inner();

        if req.container_id.is_empty() {
            return Err(Status::invalid_argument("container_id is required"));
        }

        let container = self
            .registry
            .inspect(&req.container_id)
            .await
            .map_err(into_status)?;

        Ok(Response::new(InspectContainerResponse {
            container: Some(container_to_grpc(container)),
        }))
    }

    async fn image_tags(
        &self,
        request: Request<ImageTagsRequest>,
    ) -> Result<Response<ImageTagsResponse>, Status> {
        let req = request.into_inner();

        if req.repository.is_empty() {
            return Err(Status::invalid_argument("repository is required"));
        }

        let tags = self
            .registry
            .image_tags(&req.repository)
            .await
            .map_err(into_status)?;

        Ok(Response::new(ImageTagsResponse { tags }))
    }
}

fn into_status(e: RegistryError) -> Status {
    match e {
        RegistryError::NotExist(_) => Status::not_found(e.to_string()),
        RegistryError::Full => Status::resource_exhausted(e.to_string()),
        RegistryError::Mismatch { .. } => Status::invalid_argument(e.to_string()),
        RegistryError::Launch(_) => Status::unavailable(e.to_string()),
        RegistryError::DirMake { .. }
        | RegistryError::Settings(_)
        | RegistryError::Marshal(_)
        | RegistryError::Scan(_)
        | RegistryError::Patch(_)
        | RegistryError::External(_)
        | RegistryError::Io(_) => Status::internal(e.to_string()),
    }
}

fn container_to_grpc(c: Container) -> ContainerInfo {
    ContainerInfo {
        id: c.id,
        image_name: c.image_name,
        container_name: c.container_name,
        create_user: c.create_user,
        status: c.status.to_string(),
        started_at: c.started_at.unwrap_or(0),
        root_path: c.root_path.display().to_string(),
        log_path: c.log_path.display().to_string(),
        patcher_path: c.patcher_path.display().to_string(),
        fakeroot_path: c.fakeroot_path.display().to_string(),
        settings_path: c.settings_path.display().to_string(),
    }
}
