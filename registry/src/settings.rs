use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const GLOBAL_SETTINGS_FILE: &str = "burrow.toml";
pub const CONTAINER_SETTINGS_FILE: &str = "container.toml";

fn default_base_dir() -> PathBuf {
    PathBuf::from("/tmp/burrow")
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

fn default_patch_tool() -> PathBuf {
    PathBuf::from("patchelf")
}

fn default_library_dirs() -> Vec<String> {
    vec![
        "lib".to_string(),
        "lib64".to_string(),
        "usr/lib".to_string(),
        "usr/lib64".to_string(),
    ]
}

/// Process-wide settings, loaded once at registry initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Root directory under which all container trees live.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Shell launched inside a container's fakechroot context.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// External ELF rewriting tool.
    #[serde(default = "default_patch_tool")]
    pub patch_tool: PathBuf,

    /// Interception library preloaded into sandboxed processes.
    #[serde(default)]
    pub fakechroot_lib: Option<PathBuf>,

    /// Library directories (relative to a sandbox root) joined into the run
    /// path written into each patched executable.
    #[serde(default = "default_library_dirs")]
    pub library_dirs: Vec<String>,

    /// Raw per-deployment overrides that have no typed field yet.
    #[serde(default, flatten)]
    pub overrides: BTreeMap<String, toml::Value>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            shell: default_shell(),
            patch_tool: default_patch_tool(),
            fakechroot_lib: None,
            library_dirs: default_library_dirs(),
            overrides: BTreeMap::new(),
        }
    }
}

impl GlobalSettings {
    /// Searches `config_paths` in order; the first directory containing
    /// `burrow.toml` wins. Finding none is an error.
    pub fn load(config_paths: &[PathBuf]) -> Result<(Self, PathBuf), RegistryError> {
        for dir in config_paths {
            let candidate = dir.join(GLOBAL_SETTINGS_FILE);
            if candidate.is_file() {
                let raw = std::fs::read_to_string(&candidate)?;
                let settings = toml::from_str(&raw)?;
                return Ok((settings, candidate));
            }
        }
        Err(RegistryError::NotExist(format!(
            "no {} found under {:?}",
            GLOBAL_SETTINGS_FILE, config_paths
        )))
    }
}

/// Per-container settings from `settings/container.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSettings {
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    /// Extra environment layered onto launches inside this container.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default, flatten)]
    pub overrides: BTreeMap<String, toml::Value>,
}

impl ContainerSettings {
    /// Absence of the settings file is not an error; defaults apply until a
    /// first successful load.
    pub fn load(settings_dir: &Path) -> Result<Self, RegistryError> {
        let candidate = settings_dir.join(CONTAINER_SETTINGS_FILE);
        if !candidate.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&candidate)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Typed view over a raw override; a present value of the wrong shape is
    /// a mismatch, not a silent miss.
    pub fn override_str(&self, key: &str) -> Result<Option<&str>, RegistryError> {
        match self.overrides.get(key) {
            None => Ok(None),
            Some(toml::Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(RegistryError::Mismatch {
                key: key.to_string(),
                expected: "string",
                actual: other.type_str().to_string(),
            }),
        }
    }
}
