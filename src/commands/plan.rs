//! Plan a resource without changing anything.

use super::session::Session;
use super::spinner;
use crate::Context;
use crate::cli::ResourceArgs;
use crate::progress;
use crate::ui;
use anyhow::{Context as _, Result};
use reconciler::Terraformed;
use tfworkspace::CancellationToken;

pub fn run(ctx: &Context, args: ResourceArgs) -> Result<()> {
    let session = Session::open(ctx, &args.file)?;
    let workspace = session.workspace()?;
    if workspace.is_busy() {
        anyhow::bail!("{} has an operation in progress", session.resource.name());
    }

    let pb = spinner(ctx, &format!("Planning {}", session.resource.name()));
    let token = CancellationToken::with_timeout(session.config.async_timeout());
    let plan = match workspace.plan(&token) {
        Ok(plan) => plan,
        Err(e) => {
            progress::finish_error(&pb, "Plan failed");
            return Err(e).with_context(|| format!("Could not plan {}", session.resource.name()));
        }
    };
    pb.finish_and_clear();

    ui::header(&format!("Plan for {}", session.resource.name()));
    ui::kv("workspace", &workspace.dir().display().to_string());
    ui::flag("exists", plan.exists);
    ui::flag("up to date", plan.up_to_date);
    if !plan.exists {
        ui::dim("Nothing recorded in state; create would add the resource");
    }
    Ok(())
}
