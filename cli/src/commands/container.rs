use burrow_core::burrow::container_service_client::ContainerServiceClient;
use burrow_core::burrow::{
    ContainerInfo, CreateContainerRequest, DestroyContainerRequest, ImageTagsRequest,
    InspectContainerRequest, ListContainersRequest, RunContainerRequest,
};
use clap::Subcommand;

use crate::utils::format_timestamp;

#[derive(Subcommand)]
pub enum ContainerCommands {
    /// Create a new container from an extracted image tree
    Create {
        /// Path to the image tree on the daemon host
        image: String,

        /// Image name recorded for the container
        #[arg(long)]
        image_name: String,

        /// Assign a name to the container
        #[arg(long)]
        name: Option<String>,

        /// User recorded as the creator
        #[arg(long, default_value = "")]
        user: String,
    },
    /// Launch a container's sandbox shell
    Run {
        /// Container ID
        container_id: String,
    },
    /// List containers
    #[command(visible_alias = "ls")]
    List,
    /// Display detailed information on a container
    Inspect {
        /// Container ID
        container_id: String,
    },
    /// Remove a container from the registry
    #[command(visible_alias = "rm")]
    Destroy {
        /// Container ID
        container_id: String,
    },
    /// List the tags of a repository via the pull service
    Tags {
        /// Repository, e.g. library/alpine
        repository: String,
    },
}

pub async fn handle_container_command(
    daemon_addr: &str,
    cmd: ContainerCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = ContainerServiceClient::connect(daemon_addr.to_string()).await?;

    match cmd {
        ContainerCommands::Create {
            image,
            image_name,
            name,
            user,
        } => {
            let response = client
                .create_container(CreateContainerRequest {
                    image,
                    image_name,
                    name: name.unwrap_or_default(),
                    user,
                })
                .await?
                .into_inner();

            if let Some(container) = response.container {
                println!("{}", container.id);
            }
        }
        ContainerCommands::Run { container_id } => {
            let response = client
                .run_container(RunContainerRequest { container_id })
                .await?
                .into_inner();

            if let Some(container) = response.container {
                println!("{} {}", container.id, container.status);
            }
        }
        ContainerCommands::List => {
            let response = client
                .list_containers(ListContainersRequest {})
                .await?
                .into_inner();

            println!(
                "{:<6} {:<20} {:<24} {:<10} {}",
                "ID", "IMAGE", "NAME", "STATUS", "STARTED"
            );
            for container in response.containers {
                println!(
                    "{:<6} {:<20} {:<24} {:<10} {}",
                    container.id,
                    container.image_name,
                    container.container_name,
                    container.status,
                    format_timestamp(container.started_at)
                );
            }
        }
        ContainerCommands::Inspect { container_id } => {
            let response = client
                .inspect_container(InspectContainerRequest { container_id })
                .await?
                .into_inner();

            if let Some(container) = response.container {
                print_container(&container);
            }
        }
        ContainerCommands::Destroy { container_id } => {
            client
                .destroy_container(DestroyContainerRequest {
                    container_id: container_id.clone(),
                })
                .await?;
            println!("{}", container_id);
        }
        ContainerCommands::Tags { repository } => {
            let response = client
                .image_tags(ImageTagsRequest { repository })
                .await?
                .into_inner();

            for tag in response.tags {
                println!("{}", tag);
            }
        }
    }

    Ok(())
}

fn print_container(container: &ContainerInfo) {
    println!("id:            {}", container.id);
    println!("name:          {}", container.container_name);
    println!("image:         {}", container.image_name);
    println!("created by:    {}", container.create_user);
    println!("status:        {}", container.status);
    println!("started:       {}", format_timestamp(container.started_at));
    println!("root:          {}", container.root_path);
    println!("log:           {}", container.log_path);
    println!("elf workspace: {}", container.patcher_path);
    println!("fakechroot:    {}", container.fakeroot_path);
    println!("settings:      {}", container.settings_path);
}
