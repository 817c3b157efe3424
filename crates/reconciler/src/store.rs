//! Registry of workspaces keyed by resource identity.

use crate::error::{Error, Result};
use crate::resource::Terraformed;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tfworkspace::{DEFAULT_ASYNC_TIMEOUT, DEFAULT_BINARY, Notifier, ProcessRunner, Runner, Workspace};

/// Builds the completion callback of a new workspace from the resource uid.
pub type NotifierFactory = Arc<dyn Fn(&str) -> Notifier + Send + Sync>;

/// Owns one [`Workspace`] per resource, each in `<root>/<uid>`.
pub struct WorkspaceStore {
    root: PathBuf,
    runner: Arc<dyn Runner>,
    binary: String,
    env: Vec<(String, String)>,
    async_timeout: Duration,
    provider: Option<Value>,
    notifier_factory: Option<NotifierFactory>,
    workspaces: Mutex<HashMap<String, Arc<Workspace>>>,
}

impl fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("root", &self.root)
            .field("binary", &self.binary)
            .field("async_timeout", &self.async_timeout)
            .field("workspaces", &self.len())
            .finish_non_exhaustive()
    }
}

impl WorkspaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            runner: Arc::new(ProcessRunner::new()),
            binary: DEFAULT_BINARY.to_string(),
            env: Vec::new(),
            async_timeout: DEFAULT_ASYNC_TIMEOUT,
            provider: None,
            notifier_factory: None,
            workspaces: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// Provider block copied verbatim into every configuration.
    pub fn with_provider(mut self, provider: Value) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_notifier_factory(mut self, factory: NotifierFactory) -> Self {
        self.notifier_factory = Some(factory);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Workspace of `uid`, if one has been created.
    pub fn get(&self, uid: &str) -> Option<Arc<Workspace>> {
        self.lock().get(uid).cloned()
    }

    /// Workspace of `resource`, created on first use.
    ///
    /// While no operation is running the configuration is rewritten from the
    /// resource's parameters. A missing state file is seeded from the state
    /// persisted on the resource, which restores a workspace lost with a
    /// restart.
    pub fn workspace_for<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<Arc<Workspace>> {
        validate_uid(resource.uid())?;
        let workspace = {
            let mut workspaces = self.lock();
            Arc::clone(
                workspaces
                    .entry(resource.uid().to_string())
                    .or_insert_with(|| Arc::new(self.build(resource.uid()))),
            )
        };

        if workspace.is_busy() {
            return Ok(workspace);
        }

        let config = render_config(resource, self.provider.as_ref())?;
        workspace
            .write_config(&config)
            .map_err(Error::workspace("write configuration"))?;

        if !workspace.has_state_file() {
            if let Some(encoded) = resource.persisted_state() {
                log::info!("Restoring state of {} from the resource", resource.uid());
                let state =
                    tfstate::from_encoded(encoded).map_err(Error::state("restore state"))?;
                let raw = tfstate::serialize(&state).map_err(Error::state("restore state"))?;
                workspace
                    .write_state(&raw)
                    .map_err(Error::workspace("restore state"))?;
            }
        }

        Ok(workspace)
    }

    /// Forget the workspace of `uid` and delete its directory.
    pub fn remove(&self, uid: &str) -> Result<()> {
        validate_uid(uid)?;
        let Some(workspace) = self.lock().remove(uid) else {
            return Ok(());
        };
        if let Err(e) = workspace.remove() {
            // Keep tracking it so that a later attempt can clean up
            self.lock().insert(uid.to_string(), workspace);
            return Err(Error::workspace("remove workspace")(e));
        }
        log::debug!("Removed workspace of {uid}");
        Ok(())
    }

    fn build(&self, uid: &str) -> Workspace {
        log::debug!("Creating workspace for {uid}");
        let mut workspace = Workspace::new(self.root.join(uid))
            .with_runner(Arc::clone(&self.runner))
            .with_binary(self.binary.clone())
            .with_env(self.env.clone())
            .with_async_timeout(self.async_timeout);
        if let Some(factory) = &self.notifier_factory {
            workspace = workspace.with_notifier(factory(uid));
        }
        workspace
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Workspace>>> {
        self.workspaces.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Check that `uid` names exactly one directory below the store root.
///
/// Empty identities, `.`, `..`, absolute paths and anything containing a
/// path separator are rejected.
pub fn validate_uid(uid: &str) -> Result<()> {
    let mut components = Path::new(uid).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == uid
    );
    if single && !uid.contains(['/', '\\']) {
        return Ok(());
    }
    Err(Error::InvalidUid {
        uid: uid.to_string(),
    })
}

/// Render `main.tf.json` for `resource`.
///
/// `{"resource": {<type>: {<name>: <parameters>}}}`, plus `provider` when given.
pub fn render_config<R: Terraformed + ?Sized>(
    resource: &R,
    provider: Option<&Value>,
) -> Result<Vec<u8>> {
    let mut blocks = Map::new();
    blocks.insert(resource.name().to_string(), Value::Object(resource.parameters()));

    let mut config = Map::new();
    if let Some(provider) = provider {
        config.insert("provider".to_string(), provider.clone());
    }
    let mut types = Map::new();
    types.insert(
        resource.terraform_resource_type().to_string(),
        Value::Object(blocks),
    );
    config.insert("resource".to_string(), Value::Object(types));

    serde_json::to_vec_pretty(&Value::Object(config)).map_err(Error::RenderConfig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{GroupVersionKind, ManagedResource};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tfworkspace::{CONFIG_FILE_NAME, FakeResponse, FakeRunner};

    fn bucket(uid: &str) -> ManagedResource {
        let mut parameters = Map::new();
        parameters.insert("bucket".to_string(), json!("logs"));
        ManagedResource::new(
            uid,
            "logs",
            GroupVersionKind::new("s3.aws.tfjet.io", "v1alpha1", "Bucket"),
            "aws_s3_bucket",
        )
        .with_parameters(parameters)
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_render_config_layout() {
        let raw = render_config(&bucket("a"), Some(&json!({"aws": {"region": "eu-west-1"}})))
            .unwrap();
        let config: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            config,
            json!({
                "provider": {"aws": {"region": "eu-west-1"}},
                "resource": {"aws_s3_bucket": {"logs": {"bucket": "logs"}}}
            })
        );

        let raw = render_config(&bucket("a"), None).unwrap();
        let config: Value = serde_json::from_slice(&raw).unwrap();
        assert!(config.get("provider").is_none());
    }

    #[test]
    fn test_workspace_for_creates_directory_and_config() {
        let root = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(root.path()).with_runner(Arc::new(FakeRunner::new()));

        let workspace = store.workspace_for(&bucket("uid-1")).unwrap();
        assert_eq!(workspace.dir(), root.path().join("uid-1"));
        let config = read_json(&root.path().join("uid-1").join(CONFIG_FILE_NAME));
        assert_eq!(config["resource"]["aws_s3_bucket"]["logs"]["bucket"], "logs");
        assert!(!workspace.has_state_file());

        // Same uid, same workspace
        let again = store.workspace_for(&bucket("uid-1")).unwrap();
        assert!(Arc::ptr_eq(&workspace, &again));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_config_follows_parameter_changes() {
        let root = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(root.path()).with_runner(Arc::new(FakeRunner::new()));
        let mut resource = bucket("uid-1");
        store.workspace_for(&resource).unwrap();

        resource
            .parameters
            .insert("force_destroy".to_string(), json!(true));
        let workspace = store.workspace_for(&resource).unwrap();
        let config = read_json(&workspace.config_path());
        assert_eq!(
            config["resource"]["aws_s3_bucket"]["logs"]["force_destroy"],
            true
        );
    }

    #[test]
    fn test_config_untouched_while_busy() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.push(FakeResponse::success("").held());
        let store = WorkspaceStore::new(root.path()).with_runner(runner.clone());
        let mut resource = bucket("uid-1");

        let workspace = store.workspace_for(&resource).unwrap();
        workspace.apply_async().unwrap();
        assert!(runner.wait_for_held(1, Duration::from_secs(5)));

        resource.parameters.insert("bucket".to_string(), json!("other"));
        store.workspace_for(&resource).unwrap();
        let config = read_json(&workspace.config_path());
        assert_eq!(config["resource"]["aws_s3_bucket"]["logs"]["bucket"], "logs");

        runner.release();
    }

    #[test]
    fn test_state_seeded_from_persisted_state() {
        let root = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(root.path()).with_runner(Arc::new(FakeRunner::new()));
        let state = tfstate::parse(
            br#"{"version":4,"serial":7,"lineage":"l","resources":[{"mode":"managed","type":"aws_s3_bucket","name":"logs","provider":"p","instances":[{"attributes":{"id":"logs"}}]}]}"#,
        )
        .unwrap();
        let mut resource = bucket("uid-1");
        resource.state = Some(tfstate::encoded(&state).unwrap());

        let workspace = store.workspace_for(&resource).unwrap();
        assert!(workspace.has_state_file());
        assert_eq!(workspace.read_state().unwrap(), state);
    }

    #[test]
    fn test_bad_persisted_state() {
        let root = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(root.path()).with_runner(Arc::new(FakeRunner::new()));
        let mut resource = bucket("uid-1");
        resource.state = Some("not base64!".to_string());

        let err = store.workspace_for(&resource).unwrap_err();
        assert!(matches!(err, Error::State { operation: "restore state", .. }));
    }

    #[test]
    fn test_remove() {
        let root = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(root.path()).with_runner(Arc::new(FakeRunner::new()));
        store.workspace_for(&bucket("uid-1")).unwrap();

        store.remove("uid-1").unwrap();
        assert!(store.is_empty());
        assert!(!root.path().join("uid-1").exists());
        store.remove("uid-1").unwrap();
    }

    #[test]
    fn test_unsafe_uids_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let victim = root.path().join("victim");
        std::fs::create_dir(&victim).unwrap();
        let store = WorkspaceStore::new(root.path().join("ws"))
            .with_runner(Arc::new(FakeRunner::new()));

        for uid in ["", ".", "..", "../victim", "a/b", "/tmp", "a\\b"] {
            let err = store.workspace_for(&bucket(uid)).unwrap_err();
            assert!(matches!(err, Error::InvalidUid { .. }), "{uid:?}");
            assert!(store.remove(uid).is_err(), "{uid:?}");
        }
        assert!(victim.is_dir());
        assert!(store.is_empty());
        assert!(!root.path().join("ws").exists());
    }

    #[test]
    fn test_validate_uid_accepts_plain_names() {
        for uid in ["3f6c1d", "uid-1", "a.b", "..hidden"] {
            validate_uid(uid).unwrap();
        }
    }

    #[test]
    fn test_notifier_factory_called_per_workspace() {
        let root = tempfile::tempdir().unwrap();
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let store = WorkspaceStore::new(root.path())
            .with_runner(Arc::new(FakeRunner::new()))
            .with_notifier_factory(Arc::new(move |_uid: &str| -> Notifier {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(|| {})
            }));

        store.workspace_for(&bucket("uid-1")).unwrap();
        store.workspace_for(&bucket("uid-1")).unwrap();
        store.workspace_for(&bucket("uid-2")).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
