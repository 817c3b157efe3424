//! Inspect the state snapshot persisted on a resource file.

use crate::Context;
use crate::cli::StateArgs;
use crate::document;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use reconciler::Terraformed;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tfstate::StateV4;

const MASK: &str = "(sensitive)";

pub fn run(_ctx: &Context, args: StateArgs) -> Result<()> {
    let resource = document::load(&args.file)?;
    let Some(encoded) = resource.persisted_state() else {
        bail!("{} has no persisted state yet", args.file.display());
    };
    let mut state = tfstate::from_encoded(encoded)
        .with_context(|| format!("Could not decode state of {}", resource.name()))?;
    if !args.show_sensitive {
        mask_sensitive(&mut state);
    }

    if args.raw {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    ui::header(&format!("State of {}", resource.name()));
    ui::kv("terraform", non_empty(&state.terraform_version));
    ui::kv("serial", &state.serial.to_string());
    ui::kv("lineage", non_empty(&state.lineage));
    ui::kv("resources", &state.resource_count().to_string());
    if let Some(first) = state.resources.first() {
        ui::kv("address", &format!("{}.{}", first.resource_type, first.name));
    }

    let attributes = state.attributes();
    if attributes.is_empty() {
        ui::dim("No attributes recorded");
        return Ok(());
    }
    ui::header("Attributes");
    for (key, value) in &attributes {
        ui::kv(key, &display_value(value));
    }
    Ok(())
}

/// Names of the top-level attributes the snapshot marks sensitive.
///
/// Accepts both the key/value map form and the tool's own list of paths
/// (`[{"type": "get_attr", "value": "password"}]` per entry).
pub fn sensitive_keys(state: &StateV4) -> BTreeSet<String> {
    match state.sensitive_attributes_raw() {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(paths)) => paths
            .iter()
            .filter_map(|path| match path {
                Value::Array(steps) => steps.first(),
                _ => None,
            })
            .filter(|step| step.get("type").and_then(Value::as_str) == Some("get_attr"))
            .filter_map(|step| step.get("value").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}

/// Replace sensitive values in the primary instance with a placeholder
pub fn mask_sensitive(state: &mut StateV4) {
    let keys = sensitive_keys(state);
    if keys.is_empty() {
        return;
    }

    if matches!(state.sensitive_attributes_raw(), Some(Value::Object(_))) {
        let masked: Map<String, Value> = keys
            .iter()
            .map(|key| (key.clone(), Value::String(MASK.to_string())))
            .collect();
        state.set_sensitive_attributes(masked);
    }

    let attributes = state
        .resources
        .first_mut()
        .and_then(|resource| resource.instances.first_mut())
        .and_then(|instance| instance.attributes.as_mut());
    if let Some(Value::Object(attributes)) = attributes {
        for key in &keys {
            if let Some(value) = attributes.get_mut(key) {
                *value = Value::String(MASK.to_string());
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn non_empty(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(sensitive: &str) -> StateV4 {
        let raw = format!(
            r#"{{
  "version": 4,
  "terraform_version": "1.5.7",
  "serial": 2,
  "lineage": "1c2f",
  "outputs": {{}},
  "resources": [{{
    "mode": "managed",
    "type": "aws_db_instance",
    "name": "main",
    "provider": "provider[\"registry.terraform.io/hashicorp/aws\"]",
    "instances": [{{
      "schema_version": 1,
      "attributes": {{"id": "db-1", "password": "hunter2", "port": 5432}},
      "sensitive_attributes": {sensitive}
    }}]
  }}]
}}"#
        );
        tfstate::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_sensitive_keys_from_map() {
        let state = state(r#"{"password": "hunter2"}"#);
        assert_eq!(
            sensitive_keys(&state),
            BTreeSet::from(["password".to_string()])
        );
    }

    #[test]
    fn test_sensitive_keys_from_paths() {
        let state = state(r#"[[{"type": "get_attr", "value": "password"}], [{"type": "index", "value": 0}]]"#);
        assert_eq!(
            sensitive_keys(&state),
            BTreeSet::from(["password".to_string()])
        );
    }

    #[test]
    fn test_mask_sensitive() {
        let mut state = state(r#"{"password": "hunter2"}"#);
        mask_sensitive(&mut state);

        let attributes = state.attributes();
        assert_eq!(attributes["password"], MASK);
        assert_eq!(attributes["id"], "db-1");
        assert_eq!(attributes["port"], 5432);
        assert_eq!(state.sensitive_attributes()["password"], MASK);
    }

    #[test]
    fn test_mask_without_sensitive_is_noop() {
        let mut state = state("[]");
        let before = state.clone();
        mask_sensitive(&mut state);
        assert_eq!(state, before);
    }
}
