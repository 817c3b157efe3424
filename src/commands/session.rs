//! One resource file wired to a workspace store.

use crate::Context;
use crate::config::TfjetConfig;
use crate::document;
use anyhow::{Context as _, Result, bail};
use reconciler::{
    CreateResult, External, ManagedResource, ObserveResult, Terraformed, UpdateResult,
    WorkspaceClient, WorkspaceStore, is_api_enabled,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use tfworkspace::{Notifier, Workspace};

pub struct Session {
    pub config: TfjetConfig,
    pub resource: ManagedResource,
    file: PathBuf,
    external: External<WorkspaceClient>,
    finished: Receiver<String>,
}

impl Session {
    /// Load the config and resource file, refusing kinds that are not enabled
    pub fn open(ctx: &Context, file: &Path) -> Result<Self> {
        let config = TfjetConfig::load(ctx.config.as_deref())?;
        let resource = document::load(file)?;

        let gvk = resource.group_version_kind();
        if !is_api_enabled(gvk, &config.enabled_apis)? {
            bail!("{gvk} is not enabled (see enabled_apis in the config)");
        }

        let (tx, finished) = mpsc::channel();
        let mut store = WorkspaceStore::new(config.workspaces_dir()?)
            .with_binary(config.terraform_bin.clone())
            .with_env(config.env_pairs())
            .with_async_timeout(config.async_timeout())
            .with_notifier_factory(Arc::new(move |uid: &str| -> Notifier {
                let tx = tx.clone();
                let uid = uid.to_string();
                Arc::new(move || {
                    // The receiver is gone once the command returns
                    let _ = tx.send(uid.clone());
                })
            }));
        if let Some(provider) = config.provider_json()? {
            store = store.with_provider(provider);
        }
        log::debug!("Workspaces under {}", store.root().display());

        Ok(Self {
            config,
            resource,
            file: file.to_path_buf(),
            external: External::new(WorkspaceClient::new(store)),
            finished,
        })
    }

    pub fn observe(&mut self) -> reconciler::Result<ObserveResult> {
        self.external.observe(&mut self.resource)
    }

    pub fn create(&mut self) -> reconciler::Result<CreateResult> {
        self.external.create(&mut self.resource)
    }

    pub fn update(&mut self) -> reconciler::Result<UpdateResult> {
        self.external.update(&mut self.resource)
    }

    pub fn delete(&mut self) -> reconciler::Result<()> {
        self.external.delete(&mut self.resource)
    }

    /// Workspace of the resource, created and restored on first use
    pub fn workspace(&self) -> Result<Arc<Workspace>> {
        self.external
            .client()
            .store()
            .workspace_for(&self.resource)
            .with_context(|| format!("Could not prepare workspace for {}", self.resource.name()))
    }

    /// Whether a background apply or destroy is still running
    pub fn is_busy(&self) -> bool {
        self.external
            .client()
            .store()
            .get(self.resource.uid())
            .is_some_and(|ws| ws.is_busy())
    }

    /// Block until a background operation ends or `timeout` passes
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.finished.recv_timeout(timeout) {
            Ok(uid) => {
                log::debug!("Operation on {uid} ended");
                true
            }
            Err(_) => false,
        }
    }

    /// Wait for any background operation to end.
    ///
    /// The operation record lives in this process, so exiting while it runs
    /// would orphan the tool.
    pub fn drain(&self) {
        while self.is_busy() {
            self.wait(Duration::from_secs(1));
        }
    }

    /// Drop what the file remembers about a deleted remote object
    pub fn clear_remote(&mut self) {
        self.resource.external_name = None;
        self.resource.state = None;
        self.resource.observation.clear();
    }

    /// Write the resource back to its file
    pub fn save(&self) -> Result<()> {
        document::save(&self.file, &self.resource)
    }
}
