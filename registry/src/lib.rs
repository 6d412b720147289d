mod boundary;
mod container;
mod error;
mod registry;
mod settings;
mod slots;

pub use boundary::{
    DirExtractor, ImageExtractor, ImagePuller, MemoryStore, MetadataStore, ServiceError,
};
pub use container::{Container, ContainerStatus};
pub use error::RegistryError;
pub use registry::{CreateParams, Registry, SandboxLauncher};
pub use settings::{ContainerSettings, GlobalSettings, CONTAINER_SETTINGS_FILE, GLOBAL_SETTINGS_FILE};
pub use slots::{SlotTable, SLOT_CAPACITY};
