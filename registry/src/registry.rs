use crate::boundary::{ImageExtractor, ImagePuller, MetadataStore, ServiceError};
use crate::container::{Container, ContainerStatus};
use crate::error::RegistryError;
use crate::settings::{ContainerSettings, GlobalSettings};
use crate::slots::{parse_slot, slot_id, SlotTable};
use async_trait::async_trait;
use burrow_executor::CommandSpec;
use burrow_patcher::{PatchOp, Patcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

const METADATA_FILE: &str = "container.json";

/// Dispatch seam for launching a process inside a container's context. The
/// exec client implements this; tests plug in doubles.
#[async_trait]
pub trait SandboxLauncher: Send + Sync {
    /// Launches the command and returns the spawned process id.
    async fn launch(&self, spec: CommandSpec) -> Result<u32, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct CreateParams {
    /// Local path handed to the extraction service.
    pub image: PathBuf,
    pub image_name: String,
    pub name: Option<String>,
    pub user: String,
}

struct RegistryInner {
    slots: SlotTable,
    containers: HashMap<String, Container>,
}

/// Owns the id space and the map of live containers. All shared mutable
/// state lives behind one lock; callers never hold a container reference
/// outside a registry operation.
pub struct Registry {
    base_dir: PathBuf,
    settings: GlobalSettings,
    patcher: Patcher,
    extractor: Arc<dyn ImageExtractor>,
    store: Arc<dyn MetadataStore>,
    puller: Option<Arc<dyn ImagePuller>>,
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Loads global settings from the first config directory containing
    /// `burrow.toml`, creates the base directory and reloads any containers
    /// persisted by a previous run.
    pub async fn init(
        config_paths: &[PathBuf],
        extractor: Arc<dyn ImageExtractor>,
        store: Arc<dyn MetadataStore>,
    ) -> Result<Self, RegistryError> {
        let (settings, origin) = GlobalSettings::load(config_paths)?;
        tracing::info!(settings = %origin.display(), "loaded global settings");

        let base_dir = settings.base_dir.clone();
        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| RegistryError::DirMake {
                path: base_dir.clone(),
                source: e,
            })?;

        let registry = Self {
            base_dir,
            settings,
            patcher: Patcher::new(),
            extractor,
            store,
            puller: None,
            inner: RwLock::new(RegistryInner {
                slots: SlotTable::new(),
                containers: HashMap::new(),
            }),
        };
        registry.reload_persisted().await?;
        Ok(registry)
    }

    pub fn with_puller(mut self, puller: Arc<dyn ImagePuller>) -> Self {
        self.puller = Some(puller);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    async fn reload_persisted(&self) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(slot) = parse_slot(&name) else {
                continue;
            };
            let metadata_path = entry.path().join(METADATA_FILE);
            if !metadata_path.exists() {
                continue;
            }
            let raw = tokio::fs::read_to_string(&metadata_path).await?;
            match serde_json::from_str::<Container>(&raw) {
                Ok(container) => {
                    inner.slots.mark_taken(slot);
                    inner.containers.insert(container.id.clone(), container);
                }
                Err(e) => {
                    tracing::warn!(container_id = %name, "skipping unreadable metadata: {}", e)
                }
            }
        }

        if !inner.containers.is_empty() {
            tracing::info!(count = inner.containers.len(), "reloaded persisted containers");
        }
        Ok(())
    }

    /// Allocates an id slot, provisions the directory skeleton, extracts the
    /// image and rewrites the run path of every executable in the tree.
    ///
    /// The first failure aborts the creation: the container is never
    /// registered and the slot is released for reuse. Partially provisioned
    /// directories and partially patched files stay on disk for inspection.
    pub async fn create_container(&self, params: CreateParams) -> Result<Container, RegistryError> {
        let slot = {
            let mut inner = self.inner.write().await;
            inner.slots.allocate().ok_or(RegistryError::Full)?
        };
        let id = slot_id(slot);

        match self.provision(&id, &params).await {
            Ok(container) => {
                let mut inner = self.inner.write().await;
                inner.containers.insert(id.clone(), container.clone());
                tracing::info!(container_id = %id, image = %params.image_name, "container created");
                Ok(container)
            }
            Err(e) => {
                let mut inner = self.inner.write().await;
                inner.slots.release(slot);
                Err(e)
            }
        }
    }

    async fn provision(&self, id: &str, params: &CreateParams) -> Result<Container, RegistryError> {
        let name = params
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", params.image_name, id));
        let mut container =
            Container::new(id.to_string(), &self.base_dir, &params.image_name, &name, &params.user);

        for dir in container.dirs() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| RegistryError::DirMake {
                    path: dir.clone(),
                    source: e,
                })?;
        }

        self.extractor
            .extract(&params.image, &container.root_path)
            .await?;

        container.settings = ContainerSettings::load(&container.settings_path)?;

        self.patch_tree(&container).await?;

        self.persist(&container).await?;
        self.store.set(&store_key(id), &params.image_name).await?;
        Ok(container)
    }

    /// Rewrites every executable so shared libraries resolve from inside the
    /// sandbox. Files are patched sequentially in traversal order; the first
    /// failure wins and the remaining files are not attempted.
    async fn patch_tree(&self, container: &Container) -> Result<(), RegistryError> {
        let executables = burrow_scanner::walk(&container.root_path)?;

        let run_path = self
            .settings
            .library_dirs
            .iter()
            .map(|dir| container.root_path.join(dir).display().to_string())
            .collect::<Vec<_>>()
            .join(":");

        for file in &executables {
            self.patcher
                .patch(
                    PatchOp::SetRpath,
                    &self.settings.patch_tool,
                    &[run_path.clone(), file.display().to_string()],
                )
                .await?;
        }

        if !executables.is_empty() {
            tracing::info!(
                container_id = %container.id,
                patched = executables.len(),
                "rewrote run paths"
            );
        }
        Ok(())
    }

    /// Marks the container running and launches its sandbox shell through
    /// the dispatch seam. A failed launch rolls the transition back.
    pub async fn run_container(
        &self,
        id: &str,
        launcher: &dyn SandboxLauncher,
    ) -> Result<Container, RegistryError> {
        let (container, spec) = {
            let mut inner = self.inner.write().await;
            let container = inner
                .containers
                .get_mut(id)
                .ok_or_else(|| RegistryError::NotExist(format!("container {id}")))?;
            container.status = ContainerStatus::Running;
            container.started_at = Some(unix_now());
            let spec = self.launch_spec(container);
            (container.clone(), spec)
        };

        match launcher.launch(spec).await {
            Ok(pid) => {
                self.persist(&container).await?;
                tracing::info!(container_id = %id, pid, "container running");
                Ok(container)
            }
            Err(e) => {
                let mut inner = self.inner.write().await;
                if let Some(container) = inner.containers.get_mut(id) {
                    container.status = ContainerStatus::Stopped;
                    container.started_at = None;
                }
                Err(RegistryError::Launch(e.to_string()))
            }
        }
    }

    fn launch_spec(&self, container: &Container) -> CommandSpec {
        let shell = container
            .settings
            .shell
            .clone()
            .unwrap_or_else(|| self.settings.shell.clone());

        let mut env = HashMap::new();
        env.insert(
            "FAKECHROOT_BASE".to_string(),
            container.root_path.display().to_string(),
        );
        if let Some(lib) = &self.settings.fakechroot_lib {
            env.insert("LD_PRELOAD".to_string(), lib.display().to_string());
        }
        for (key, value) in &container.settings.env {
            env.insert(key.clone(), value.clone());
        }

        let dir = container
            .settings
            .working_dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| container.root_path.clone());

        CommandSpec {
            command: shell,
            args: Vec::new(),
            env,
            dir: Some(dir),
            timeout: None,
        }
    }

    /// Unregisters the container and releases its id slot. A running process
    /// is not stopped and the directory tree is left on disk; only the
    /// persisted metadata record is removed.
    pub async fn destroy_container(&self, id: &str) -> Result<(), RegistryError> {
        let container = {
            let mut inner = self.inner.write().await;
            let container = inner
                .containers
                .remove(id)
                .ok_or_else(|| RegistryError::NotExist(format!("container {id}")))?;
            if let Some(slot) = parse_slot(id) {
                inner.slots.release(slot);
            }
            container
        };

        let metadata_path = self.base_dir.join(id).join(METADATA_FILE);
        if metadata_path.exists() {
            tokio::fs::remove_file(&metadata_path).await?;
        }
        self.store.delete(&store_key(id)).await?;

        tracing::info!(container_id = %id, image = %container.image_name, "container destroyed");
        Ok(())
    }

    pub async fn list(&self) -> Vec<Container> {
        let inner = self.inner.read().await;
        let mut containers: Vec<_> = inner.containers.values().cloned().collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        containers
    }

    pub async fn inspect(&self, id: &str) -> Result<Container, RegistryError> {
        let inner = self.inner.read().await;
        inner
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotExist(format!("container {id}")))
    }

    /// Re-reads `settings/container.toml`; the refreshed settings apply to
    /// the next launch.
    pub async fn reload_settings(&self, id: &str) -> Result<Container, RegistryError> {
        let mut inner = self.inner.write().await;
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotExist(format!("container {id}")))?;
        container.settings = ContainerSettings::load(&container.settings_path)?;
        Ok(container.clone())
    }

    /// Tag listing by way of the external pull service; image registries are
    /// never spoken to directly from this crate.
    pub async fn image_tags(&self, repo: &str) -> Result<Vec<String>, RegistryError> {
        let puller = self.puller.as_ref().ok_or_else(|| {
            RegistryError::NotExist("no image pull service configured".to_string())
        })?;
        let token = puller.authenticate(repo, "pull").await?;
        Ok(puller.list_tags(repo, &token).await?)
    }

    async fn persist(&self, container: &Container) -> Result<(), RegistryError> {
        let path = self.base_dir.join(&container.id).join(METADATA_FILE);
        let raw = serde_json::to_string_pretty(container)?;
        tokio::fs::write(&path, raw).await?;
        Ok(())
    }
}

fn store_key(id: &str) -> String {
    format!("container/{id}")
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{DirExtractor, MemoryStore};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct OkLauncher;

    #[async_trait]
    impl SandboxLauncher for OkLauncher {
        async fn launch(&self, spec: CommandSpec) -> Result<u32, ServiceError> {
            assert!(spec.env.contains_key("FAKECHROOT_BASE"));
            assert!(spec.dir.is_some());
            Ok(4242)
        }
    }

    struct FailLauncher;

    #[async_trait]
    impl SandboxLauncher for FailLauncher {
        async fn launch(&self, _spec: CommandSpec) -> Result<u32, ServiceError> {
            Err(ServiceError::Unavailable("exec service down".to_string()))
        }
    }

    struct StubPuller;

    #[async_trait]
    impl ImagePuller for StubPuller {
        async fn authenticate(&self, _repo: &str, scope: &str) -> Result<String, ServiceError> {
            Ok(format!("token-{scope}"))
        }

        async fn pull_manifest(
            &self,
            _repo: &str,
            _tag: &str,
            _token: &str,
        ) -> Result<Vec<u8>, ServiceError> {
            Ok(b"{}".to_vec())
        }

        async fn list_tags(&self, _repo: &str, token: &str) -> Result<Vec<String>, ServiceError> {
            assert_eq!(token, "token-pull");
            Ok(vec!["latest".to_string(), "v1".to_string()])
        }
    }

    fn write_executable(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// A patch tool that appends each target file to a marker, failing on
    /// files whose name contains "bad".
    fn fake_tool(tmp: &TempDir) -> (PathBuf, PathBuf) {
        let marker = tmp.path().join("patch-calls.log");
        let tool = tmp.path().join("patchtool");
        write_executable(
            &tool,
            &format!(
                "#!/bin/sh\ncase \"$3\" in *bad*) exit 3 ;; esac\necho \"$3\" >> {}\n",
                marker.display()
            ),
        );
        (tool, marker)
    }

    fn write_config(tmp: &TempDir, base_dir: &Path, tool: &Path) -> PathBuf {
        let config_dir = tmp.path().join("etc");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("burrow.toml"),
            format!(
                "base_dir = {:?}\npatch_tool = {:?}\nshell = \"/bin/sh\"\n",
                base_dir, tool
            ),
        )
        .unwrap();
        config_dir
    }

    fn test_image(tmp: &TempDir, names: &[&str]) -> PathBuf {
        let image = tmp.path().join("image");
        fs::create_dir_all(image.join("bin")).unwrap();
        fs::create_dir_all(image.join("lib")).unwrap();
        for name in names {
            write_executable(&image.join("bin").join(name), "#!/bin/sh\n");
        }
        fs::write(image.join("lib/libapp.so"), b"not executable").unwrap();
        image
    }

    async fn test_registry(tmp: &TempDir) -> (Registry, PathBuf) {
        let base_dir = tmp.path().join("containers");
        let (tool, marker) = fake_tool(tmp);
        let config_dir = write_config(tmp, &base_dir, &tool);
        let registry = Registry::init(
            &[config_dir],
            Arc::new(DirExtractor),
            Arc::new(MemoryStore::default()),
        )
        .await
        .unwrap();
        (registry, marker)
    }

    fn params(image: PathBuf) -> CreateParams {
        CreateParams {
            image,
            image_name: "alpine".to_string(),
            name: None,
            user: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_provisions_skeleton_and_patches() {
        let tmp = TempDir::new().unwrap();
        let (registry, marker) = test_registry(&tmp).await;
        let image = test_image(&tmp, &["app", "helper"]);

        let container = registry.create_container(params(image)).await.unwrap();

        assert_eq!(container.id, "0000");
        assert_eq!(container.status, ContainerStatus::Stopped);
        assert_eq!(container.container_name, "alpine-0000");

        // All five derived paths share the <base>/<id>/ prefix and exist.
        let home = registry.base_dir().join(&container.id);
        for dir in container.dirs() {
            assert!(dir.starts_with(&home), "{:?} escapes {:?}", dir, home);
            assert!(dir.is_dir());
        }

        // Both executables were patched; the library was not.
        let calls = fs::read_to_string(&marker).unwrap();
        let patched: Vec<&str> = calls.lines().collect();
        assert_eq!(patched.len(), 2);
        assert!(patched.iter().all(|line| line.contains("/instance/bin/")));

        // Metadata is persisted and the store knows the image.
        assert!(home.join(METADATA_FILE).is_file());
        assert_eq!(
            registry.store.get("container/0000").await.unwrap().as_deref(),
            Some("alpine")
        );
    }

    #[tokio::test]
    async fn test_sequential_ids_are_distinct_and_increasing() {
        let tmp = TempDir::new().unwrap();
        let (registry, _marker) = test_registry(&tmp).await;
        let image = test_image(&tmp, &["app"]);

        for expected in ["0000", "0001", "0002"] {
            let container = registry
                .create_container(params(image.clone()))
                .await
                .unwrap();
            assert_eq!(container.id, expected);
        }
    }

    #[tokio::test]
    async fn test_create_fails_with_full_when_slots_are_exhausted() {
        let tmp = TempDir::new().unwrap();
        let (registry, _marker) = test_registry(&tmp).await;
        let image = test_image(&tmp, &["app"]);

        {
            let mut inner = registry.inner.write().await;
            while inner.slots.allocate().is_some() {}
        }

        let result = registry.create_container(params(image)).await;
        assert!(matches!(result, Err(RegistryError::Full)));
    }

    #[tokio::test]
    async fn test_patch_failure_aborts_creation_and_releases_the_slot() {
        let tmp = TempDir::new().unwrap();
        let (registry, marker) = test_registry(&tmp).await;
        // Traversal order is aa-first, mm-bad, zz-last; the failure on the
        // second file must leave the third unattempted.
        let image = test_image(&tmp, &["aa-first", "mm-bad", "zz-last"]);

        let result = registry.create_container(params(image.clone())).await;
        assert!(matches!(result, Err(RegistryError::Patch(_))));
        assert!(registry.list().await.is_empty());

        let calls = fs::read_to_string(&marker).unwrap();
        assert_eq!(calls.lines().count(), 1);
        assert!(calls.contains("aa-first"));
        assert!(!calls.contains("zz-last"));

        // The failed creation's slot is free again.
        fs::remove_file(image.join("bin/mm-bad")).unwrap();
        let container = registry.create_container(params(image)).await.unwrap();
        assert_eq!(container.id, "0000");
    }

    #[tokio::test]
    async fn test_run_sets_state_and_rolls_back_on_launch_failure() {
        let tmp = TempDir::new().unwrap();
        let (registry, _marker) = test_registry(&tmp).await;
        let image = test_image(&tmp, &["app"]);
        let id = registry
            .create_container(params(image))
            .await
            .unwrap()
            .id;

        let result = registry.run_container(&id, &FailLauncher).await;
        assert!(matches!(result, Err(RegistryError::Launch(_))));
        let container = registry.inspect(&id).await.unwrap();
        assert_eq!(container.status, ContainerStatus::Stopped);
        assert_eq!(container.started_at, None);

        let container = registry.run_container(&id, &OkLauncher).await.unwrap();
        assert_eq!(container.status, ContainerStatus::Running);
        assert!(container.started_at.is_some());
    }

    #[tokio::test]
    async fn test_lookup_miss_returns_not_exist_without_mutation() {
        let tmp = TempDir::new().unwrap();
        let (registry, _marker) = test_registry(&tmp).await;
        let image = test_image(&tmp, &["app"]);
        registry.create_container(params(image)).await.unwrap();

        let run = registry.run_container("nonexistent", &OkLauncher).await;
        assert!(matches!(run, Err(RegistryError::NotExist(_))));
        let destroy = registry.destroy_container("nonexistent").await;
        assert!(matches!(destroy, Err(RegistryError::NotExist(_))));

        let containers = registry.list().await;
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].status, ContainerStatus::Stopped);
    }

    #[tokio::test]
    async fn test_destroy_releases_the_slot_and_store_entry() {
        let tmp = TempDir::new().unwrap();
        let (registry, _marker) = test_registry(&tmp).await;
        let image = test_image(&tmp, &["app"]);

        let id = registry
            .create_container(params(image.clone()))
            .await
            .unwrap()
            .id;
        registry.destroy_container(&id).await.unwrap();

        assert!(registry.list().await.is_empty());
        assert_eq!(registry.store.get("container/0000").await.unwrap(), None);
        // The sandbox tree survives destruction; only the record is gone.
        assert!(registry.base_dir().join(&id).join("instance").is_dir());
        assert!(!registry.base_dir().join(&id).join(METADATA_FILE).exists());

        let container = registry.create_container(params(image)).await.unwrap();
        assert_eq!(container.id, "0000");
    }

    #[tokio::test]
    async fn test_containers_are_reloaded_on_init() {
        let tmp = TempDir::new().unwrap();
        let base_dir = tmp.path().join("containers");
        let (tool, _marker) = fake_tool(&tmp);
        let config_dir = write_config(&tmp, &base_dir, &tool);
        let image = test_image(&tmp, &["app"]);

        let first = Registry::init(
            &[config_dir.clone()],
            Arc::new(DirExtractor),
            Arc::new(MemoryStore::default()),
        )
        .await
        .unwrap();
        first.create_container(params(image)).await.unwrap();
        drop(first);

        let second = Registry::init(
            &[config_dir],
            Arc::new(DirExtractor),
            Arc::new(MemoryStore::default()),
        )
        .await
        .unwrap();

        let containers = second.list().await;
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "0000");

        // The reloaded slot is taken, so the next creation gets 0001.
        let image = test_image(&tmp, &["app"]);
        let container = second.create_container(params(image)).await.unwrap();
        assert_eq!(container.id, "0001");
    }

    #[tokio::test]
    async fn test_reload_settings_picks_up_edits() {
        let tmp = TempDir::new().unwrap();
        let (registry, _marker) = test_registry(&tmp).await;
        let image = test_image(&tmp, &["app"]);
        let container = registry.create_container(params(image)).await.unwrap();
        assert_eq!(container.settings.shell, None);

        fs::write(
            container.settings_path.join("container.toml"),
            "shell = \"/bin/dash\"\n\n[env]\nTERM = \"dumb\"\n",
        )
        .unwrap();

        let container = registry.reload_settings(&container.id).await.unwrap();
        assert_eq!(container.settings.shell.as_deref(), Some("/bin/dash"));
        assert_eq!(
            container.settings.env.get("TERM").map(String::as_str),
            Some("dumb")
        );
    }

    #[tokio::test]
    async fn test_image_tags_requires_a_configured_puller() {
        let tmp = TempDir::new().unwrap();
        let (registry, _marker) = test_registry(&tmp).await;

        let result = registry.image_tags("library/alpine").await;
        assert!(matches!(result, Err(RegistryError::NotExist(_))));

        let registry = registry.with_puller(Arc::new(StubPuller));
        let tags = registry.image_tags("library/alpine").await.unwrap();
        assert_eq!(tags, vec!["latest".to_string(), "v1".to_string()]);
    }
}
