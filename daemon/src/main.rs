mod services;

use burrow_core::burrow_server::BurrowServer;
use burrow_core::container_service_server::ContainerServiceServer;
use burrow_exec::ExecClient;
use burrow_registry::{DirExtractor, MemoryStore, Registry};
use clap::{Parser, Subcommand};
use services::{BurrowService, ContainerServiceGrpc};
use std::path::PathBuf;
use std::sync::Arc;
use tonic::transport::Server;

#[derive(Parser)]
#[command(name = "burrowd")]
#[command(about = "Burrow daemon gRPC server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gRPC server
    Start {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 50051)]
        port: u16,

        /// Directories searched (in order) for burrow.toml
        #[arg(long = "config-dir", default_values_os_t = default_config_dirs())]
        config_dirs: Vec<PathBuf>,
    },
}

fn default_config_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("/etc/burrow"), PathBuf::from(".")]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            host,
            port,
            config_dirs,
        } => {
            let addr = format!("{}:{}", host, port).parse()?;

            let registry = Arc::new(
                Registry::init(
                    &config_dirs,
                    Arc::new(DirExtractor),
                    Arc::new(MemoryStore::default()),
                )
                .await?,
            );

            // The exec service owns its own listener in the control-plane
            // port range; its lifetime ends with this process.
            let (exec_listener, exec_port) = burrow_exec::bind_control_port(&host).await?;
            let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
            let exec_task = tokio::spawn(burrow_exec::serve_with_shutdown(exec_listener, async {
                let _ = shutdown_rx.await;
            }));

            let launcher = ExecClient::connect(format!("http://{}:{}", host, exec_port)).await?;

            tracing::info!(
                "Starting burrow daemon gRPC server on {} (exec port {})",
                addr,
                exec_port
            );

            Server::builder()
                .add_service(BurrowServer::new(BurrowService))
                .add_service(ContainerServiceServer::new(ContainerServiceGrpc::new(
                    registry, launcher,
                )))
                .serve_with_shutdown(addr, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;

            let _ = shutdown_tx.send(());
            exec_task.await??;
        }
    }

    Ok(())
}
