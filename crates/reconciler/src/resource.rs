//! The managed resource contract consumed by the adapter.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Secrets handed back to consumers of a managed resource.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// API group, version and kind of a managed resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }
}

/// Formats as `group/version.Kind`, the form API patterns are matched against.
impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.group, self.version, self.kind)
    }
}

/// A managed resource backed by one Terraform resource.
pub trait Terraformed {
    /// Stable identity; names the resource's workspace.
    fn uid(&self) -> &str;

    /// Name of the resource block in the generated configuration.
    fn name(&self) -> &str;

    fn group_version_kind(&self) -> &GroupVersionKind;

    /// Terraform resource type, e.g. `aws_s3_bucket`.
    fn terraform_resource_type(&self) -> &str;

    /// Attribute that holds the external identifier in the state.
    fn terraform_resource_id_field(&self) -> &str;

    /// Desired arguments of the resource block.
    fn parameters(&self) -> Map<String, Value>;

    /// Record the attributes observed in the latest snapshot.
    fn set_observation(&mut self, observation: Map<String, Value>) -> Result<()>;

    /// External name, if one has been assigned.
    fn external_name(&self) -> Option<&str>;

    fn set_external_name(&mut self, name: String);

    /// Encoded snapshot persisted on the resource object.
    fn persisted_state(&self) -> Option<&str>;

    fn set_persisted_state(&mut self, encoded: String);
}

/// Plain serde representation of a managed resource.
///
/// This is the document the `tfjet` CLI reads and writes; it also serves as a
/// ready-made [`Terraformed`] implementation for tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResource {
    pub uid: String,
    pub name: String,
    pub kind: GroupVersionKind,
    pub terraform_type: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub observation: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl ManagedResource {
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        kind: GroupVersionKind,
        terraform_type: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            kind,
            terraform_type: terraform_type.into(),
            id_field: default_id_field(),
            parameters: Map::new(),
            observation: Map::new(),
            external_name: None,
            state: None,
        }
    }

    /// Replace the desired arguments.
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Use `field` as the external identifier attribute.
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }
}

impl Terraformed for ManagedResource {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn group_version_kind(&self) -> &GroupVersionKind {
        &self.kind
    }

    fn terraform_resource_type(&self) -> &str {
        &self.terraform_type
    }

    fn terraform_resource_id_field(&self) -> &str {
        &self.id_field
    }

    fn parameters(&self) -> Map<String, Value> {
        self.parameters.clone()
    }

    fn set_observation(&mut self, observation: Map<String, Value>) -> Result<()> {
        self.observation = observation;
        Ok(())
    }

    fn external_name(&self) -> Option<&str> {
        self.external_name.as_deref().filter(|name| !name.is_empty())
    }

    fn set_external_name(&mut self, name: String) {
        self.external_name = Some(name);
    }

    fn persisted_state(&self) -> Option<&str> {
        self.state.as_deref().filter(|state| !state.is_empty())
    }

    fn set_persisted_state(&mut self, encoded: String) {
        self.state = Some(encoded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gvk_display() {
        let gvk = GroupVersionKind::new("s3.aws.tfjet.io", "v1alpha1", "Bucket");
        assert_eq!(gvk.to_string(), "s3.aws.tfjet.io/v1alpha1.Bucket");
    }

    #[test]
    fn test_resource_document() {
        let doc = json!({
            "uid": "0b1d",
            "name": "logs",
            "kind": {"group": "s3.aws.tfjet.io", "version": "v1alpha1", "kind": "Bucket"},
            "terraformType": "aws_s3_bucket",
            "parameters": {"bucket": "logs", "force_destroy": true}
        });
        let resource: ManagedResource = serde_json::from_value(doc).unwrap();

        assert_eq!(resource.terraform_resource_id_field(), "id");
        assert_eq!(resource.parameters()["bucket"], "logs");
        assert!(resource.external_name().is_none());
        assert!(resource.persisted_state().is_none());

        let written = serde_json::to_value(&resource).unwrap();
        assert!(written.get("externalName").is_none());
        assert_eq!(written["terraformType"], "aws_s3_bucket");
    }

    #[test]
    fn test_empty_strings_count_as_unset() {
        let mut resource = ManagedResource::new(
            "0b1d",
            "logs",
            GroupVersionKind::new("g", "v", "K"),
            "aws_s3_bucket",
        );
        resource.set_external_name(String::new());
        resource.set_persisted_state(String::new());
        assert!(resource.external_name().is_none());
        assert!(resource.persisted_state().is_none());

        resource.set_external_name("logs".to_string());
        assert_eq!(resource.external_name(), Some("logs"));
    }
}
