//! tfjet configuration (`config.toml` in the config directory).
//!
//! ```toml
//! terraform_bin = "terraform"
//! workspaces_dir = "~/.local/state/tfjet/workspaces"
//! async_timeout_secs = 3600
//! enabled_apis = ["^s3\\.aws\\.tfjet\\.io/"]
//!
//! [provider.aws]
//! region = "eu-west-1"
//!
//! [env]
//! TF_PLUGIN_CACHE_DIR = "/var/cache/terraform"
//! ```

use crate::paths;
use anyhow::{Context, Result, bail};
use reconciler::{GroupVersionKind, is_api_enabled};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tfworkspace::{DEFAULT_ASYNC_TIMEOUT, DEFAULT_BINARY};

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfjetConfig {
    /// Provisioning tool to run
    pub terraform_bin: String,

    /// Root of the per-resource working directories (default: state dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspaces_dir: Option<String>,

    /// Deadline of background apply/destroy
    pub async_timeout_secs: u64,

    /// Regular expressions selecting the enabled kinds (empty: all)
    pub enabled_apis: Vec<String>,

    /// Provider block written verbatim into every workspace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<toml::Table>,

    /// Extra environment for the provisioning tool
    pub env: BTreeMap<String, String>,
}

impl Default for TfjetConfig {
    fn default() -> Self {
        Self {
            terraform_bin: DEFAULT_BINARY.to_string(),
            workspaces_dir: None,
            async_timeout_secs: DEFAULT_ASYNC_TIMEOUT.as_secs(),
            enabled_apis: Vec::new(),
            provider: None,
            env: BTreeMap::new(),
        }
    }
}

impl TfjetConfig {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.terraform_bin.trim().is_empty() {
            bail!("terraform_bin cannot be empty");
        }
        if self.async_timeout_secs == 0 {
            bail!("async_timeout_secs must be greater than zero");
        }
        let probe = GroupVersionKind::new("", "", "");
        for pattern in &self.enabled_apis {
            is_api_enabled(&probe, std::slice::from_ref(pattern))
                .with_context(|| format!("Invalid enabled_apis entry '{pattern}'"))?;
        }
        Ok(())
    }

    /// Resolved workspaces root
    pub fn workspaces_dir(&self) -> Result<PathBuf> {
        match &self.workspaces_dir {
            Some(dir) => Ok(paths::expand(dir)),
            None => paths::default_workspaces_dir(),
        }
    }

    pub fn async_timeout(&self) -> Duration {
        Duration::from_secs(self.async_timeout_secs)
    }

    /// Provider block as JSON, ready for `main.tf.json`
    pub fn provider_json(&self) -> Result<Option<serde_json::Value>> {
        self.provider
            .as_ref()
            .map(|table| serde_json::to_value(table).context("Invalid provider block"))
            .transpose()
    }

    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TfjetConfig::load(Some(&dir.path().join(CONFIG_FILE))).unwrap();
        assert_eq!(config, TfjetConfig::default());
        assert_eq!(config.terraform_bin, "terraform");
        assert_eq!(config.async_timeout(), Duration::from_secs(3600));
        assert!(config.provider_json().unwrap().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
terraform_bin = "tofu"
workspaces_dir = "/srv/tfjet"
async_timeout_secs = 600
enabled_apis = ["^s3\\.", "Bucket$"]

[provider.aws]
region = "eu-west-1"
max_retries = 5

[env]
TF_LOG = "DEBUG"
"#,
        )
        .unwrap();

        let config = TfjetConfig::load(Some(&path)).unwrap();
        assert_eq!(config.terraform_bin, "tofu");
        assert_eq!(config.workspaces_dir().unwrap(), PathBuf::from("/srv/tfjet"));
        assert_eq!(config.async_timeout(), Duration::from_secs(600));
        assert_eq!(config.enabled_apis.len(), 2);
        assert_eq!(
            config.provider_json().unwrap().unwrap(),
            serde_json::json!({"aws": {"region": "eu-west-1", "max_retries": 5}})
        );
        assert_eq!(
            config.env_pairs(),
            vec![("TF_LOG".to_string(), "DEBUG".to_string())]
        );
    }

    #[test]
    fn test_workspaces_dir_tilde() {
        let config = TfjetConfig {
            workspaces_dir: Some("~/tfjet-ws".to_string()),
            ..TfjetConfig::default()
        };
        let home = dirs::home_dir().unwrap();
        assert_eq!(config.workspaces_dir().unwrap(), home.join("tfjet-ws"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = TfjetConfig {
            async_timeout_secs: 0,
            ..TfjetConfig::default()
        };
        assert!(zero.validate().is_err());

        let pattern = TfjetConfig {
            enabled_apis: vec!["(".to_string()],
            ..TfjetConfig::default()
        };
        let err = pattern.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid enabled_apis entry"));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "async_timeout_secs = \"soon\"").unwrap();
        assert!(TfjetConfig::load(Some(&path)).is_err());
    }
}
