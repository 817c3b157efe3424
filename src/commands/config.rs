use anyhow::Result;

use crate::Context;
use crate::config::TfjetConfig;
use crate::paths;
use crate::ui;

pub fn show(ctx: &Context) -> Result<()> {
    let path = match &ctx.config {
        Some(path) => path.clone(),
        None => TfjetConfig::default_path()?,
    };
    let config = TfjetConfig::load(Some(&path))?;

    ui::header("Configuration");
    if path.exists() {
        ui::kv("config file", &path.display().to_string());
    } else {
        ui::kv("config file", &format!("{} (not found, using defaults)", path.display()));
    }
    ui::kv("state directory", &paths::state_dir()?.display().to_string());
    ui::kv("workspaces", &config.workspaces_dir()?.display().to_string());
    ui::kv("terraform binary", &config.terraform_bin);
    ui::kv("async timeout", &format!("{}s", config.async_timeout_secs));

    if config.enabled_apis.is_empty() {
        ui::kv("enabled apis", "all");
    } else {
        ui::kv("enabled apis", &config.enabled_apis.join(", "));
    }

    match &config.provider {
        Some(provider) => {
            let names: Vec<&str> = provider.keys().map(String::as_str).collect();
            ui::kv("providers", &names.join(", "));
        }
        None => ui::kv("providers", "none"),
    }

    if !config.env.is_empty() {
        ui::info("Environment passed to terraform");
        for key in config.env.keys() {
            ui::dim(key);
        }
    }
    Ok(())
}
