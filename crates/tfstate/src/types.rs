//! Terraform v4 state snapshot types.
//!
//! Only the fields needed to locate attributes are modelled explicitly. Every
//! other key is carried through `extra` so that a parsed snapshot can be written
//! back and consumed by the tool again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Terraform state file in format version 4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateV4 {
    /// State format version (always 4 for files this crate understands)
    pub version: u64,

    /// Version of the tool that last wrote the file
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terraform_version: String,

    /// Monotonic counter bumped on every write
    #[serde(default)]
    pub serial: u64,

    /// Identity of the state lineage
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lineage: String,

    /// Root module outputs
    #[serde(default)]
    pub outputs: Map<String, Value>,

    /// Managed and data resources
    #[serde(default)]
    pub resources: Vec<ResourceStateV4>,

    /// Any top-level key not modelled above (e.g. `check_results`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One resource block of a v4 state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStateV4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// `managed` or `data`
    pub mode: String,

    #[serde(rename = "type")]
    pub resource_type: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub each: Option<String>,

    pub provider: String,

    #[serde(default)]
    pub instances: Vec<InstanceObjectStateV4>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One instance of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceObjectStateV4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_key: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposed: Option<String>,

    #[serde(default)]
    pub schema_version: u64,

    /// Observed properties of the provisioned object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,

    /// Secrets produced by provisioning (generated passwords, keys, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive_attributes: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StateV4 {
    /// Number of resource blocks in the snapshot.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Whether the snapshot records at least one resource.
    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty()
    }

    fn primary_instance(&self) -> Option<&InstanceObjectStateV4> {
        self.resources.first()?.instances.first()
    }

    fn primary_instance_mut(&mut self) -> Option<&mut InstanceObjectStateV4> {
        self.resources.first_mut()?.instances.first_mut()
    }

    /// Raw attribute sub-tree of the primary instance, if any.
    pub fn attributes_raw(&self) -> Option<&Value> {
        self.primary_instance()?.attributes.as_ref()
    }

    /// Raw sensitive attribute sub-tree of the primary instance, if any.
    pub fn sensitive_attributes_raw(&self) -> Option<&Value> {
        self.primary_instance()?.sensitive_attributes.as_ref()
    }

    /// Observed attributes of the primary instance as a key/value map.
    ///
    /// Returns an empty map when the snapshot has no instance or the attributes
    /// are not a JSON object.
    pub fn attributes(&self) -> Map<String, Value> {
        object_or_empty(self.attributes_raw())
    }

    /// Sensitive attributes of the primary instance as a key/value map.
    ///
    /// The tool itself writes a list of attribute paths here; anything that is
    /// not an object yields an empty map.
    pub fn sensitive_attributes(&self) -> Map<String, Value> {
        object_or_empty(self.sensitive_attributes_raw())
    }

    /// Replace the sensitive attributes of the primary instance.
    ///
    /// Returns `false` when there is no instance to attach them to.
    pub fn set_sensitive_attributes(&mut self, sensitive: Map<String, Value>) -> bool {
        match self.primary_instance_mut() {
            Some(instance) => {
                instance.sensitive_attributes = Some(Value::Object(sensitive));
                true
            }
            None => false,
        }
    }
}

fn object_or_empty(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
