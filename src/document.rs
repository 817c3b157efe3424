//! Resource files read and written by the CLI.
//!
//! ```json
//! {
//!   "uid": "3f6c1d",
//!   "name": "logs",
//!   "kind": {"group": "s3.aws.tfjet.io", "version": "v1alpha1", "kind": "Bucket"},
//!   "terraformType": "aws_s3_bucket",
//!   "idField": "id",
//!   "parameters": {"bucket": "acme-logs"}
//! }
//! ```
//!
//! `observation`, `externalName` and `state` are filled in by the commands.

use anyhow::{Context, Result, bail};
use reconciler::ManagedResource;
use std::fs;
use std::path::Path;

/// Load a resource file
pub fn load(path: &Path) -> Result<ManagedResource> {
    let content =
        fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    let resource: ManagedResource = serde_json::from_slice(&content)
        .with_context(|| format!("Invalid resource file {}", path.display()))?;

    reconciler::validate_uid(&resource.uid)
        .with_context(|| format!("Invalid resource file {}", path.display()))?;
    if resource.name.trim().is_empty() {
        bail!("{}: name cannot be empty", path.display());
    }
    if resource.terraform_type.trim().is_empty() {
        bail!("{}: terraformType cannot be empty", path.display());
    }
    Ok(resource)
}

/// Write a resource file back, replacing it atomically
pub fn save(path: &Path, resource: &ManagedResource) -> Result<()> {
    let mut content = serde_json::to_string_pretty(resource)?;
    content.push('\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).with_context(|| format!("Could not write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Could not replace {}", path.display()))?;
    log::debug!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconciler::Terraformed;

    const DOC: &str = r#"{
  "uid": "3f6c1d",
  "name": "logs",
  "kind": {"group": "s3.aws.tfjet.io", "version": "v1alpha1", "kind": "Bucket"},
  "terraformType": "aws_s3_bucket",
  "parameters": {"bucket": "acme-logs"}
}"#;

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucket.json");
        fs::write(&path, DOC).unwrap();

        let mut resource = load(&path).unwrap();
        assert_eq!(resource.uid(), "3f6c1d");
        assert_eq!(resource.terraform_resource_id_field(), "id");

        resource.set_external_name("acme-logs".to_string());
        save(&path, &resource).unwrap();
        assert!(!dir.path().join("bucket.json.tmp").exists());

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.external_name(), Some("acme-logs"));
        assert_eq!(reloaded, resource);
    }

    #[test]
    fn test_rejects_unsafe_uid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucket.json");
        fs::write(&path, DOC.replace("3f6c1d", "../escape")).unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid resource identity"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("missing.json")).is_err());
    }
}
