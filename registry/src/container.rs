use crate::settings::ContainerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const INSTANCE_DIR: &str = "instance";
pub const LOG_DIR: &str = "log";
pub const ELF_DIR: &str = "elf";
pub const FAKECHROOT_DIR: &str = "fakechroot";
pub const SETTINGS_DIR: &str = "settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Stopped,
    Running,
    /// Reserved in the state machine; no operation currently transitions
    /// a container here.
    Paused,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Stopped => write!(f, "stopped"),
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Paused => write!(f, "paused"),
        }
    }
}

/// One sandbox instance. Constructed by the registry, never directly; all
/// mutation goes through registry operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub image_name: String,
    pub container_name: String,
    pub create_user: String,
    pub status: ContainerStatus,
    pub started_at: Option<i64>,
    pub root_path: PathBuf,
    pub log_path: PathBuf,
    pub patcher_path: PathBuf,
    pub fakeroot_path: PathBuf,
    pub settings_path: PathBuf,
    #[serde(default)]
    pub settings: ContainerSettings,
    /// Names of shared-memory/IPC objects tied to this container. The
    /// underlying OS resources are managed outside the registry.
    #[serde(default)]
    pub ipc_names: Vec<String>,
}

impl Container {
    pub(crate) fn new(
        id: String,
        base_dir: &Path,
        image_name: &str,
        container_name: &str,
        create_user: &str,
    ) -> Self {
        let home = base_dir.join(&id);
        Self {
            root_path: home.join(INSTANCE_DIR),
            log_path: home.join(LOG_DIR),
            patcher_path: home.join(ELF_DIR),
            fakeroot_path: home.join(FAKECHROOT_DIR),
            settings_path: home.join(SETTINGS_DIR),
            id,
            image_name: image_name.to_string(),
            container_name: container_name.to_string(),
            create_user: create_user.to_string(),
            status: ContainerStatus::Stopped,
            started_at: None,
            settings: ContainerSettings::default(),
            ipc_names: Vec::new(),
        }
    }

    /// The directory skeleton provisioned for this container, in creation
    /// order.
    pub fn dirs(&self) -> [&PathBuf; 5] {
        [
            &self.root_path,
            &self.log_path,
            &self.patcher_path,
            &self.fakeroot_path,
            &self.settings_path,
        ]
    }
}
