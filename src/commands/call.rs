//! Single adapter calls: observe, create, update and delete.
//!
//! Create, update and delete return as soon as the background operation is
//! started; these commands keep calling until the adapter reports completion.

use super::session::Session;
use super::spinner;
use crate::Context;
use crate::cli::ResourceArgs;
use crate::progress;
use crate::ui;
use anyhow::Result;
use reconciler::{ConnectionDetails, Terraformed};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn observe(ctx: &Context, args: ResourceArgs) -> Result<()> {
    let mut session = Session::open(ctx, &args.file)?;
    let pb = spinner(ctx, &format!("Observing {}", session.resource.name()));

    let observed = match session.observe() {
        Ok(observed) => observed,
        Err(e) => {
            progress::finish_error(&pb, &format!("Observe failed: {e}"));
            return Err(e.into());
        }
    };
    pb.finish_and_clear();
    session.save()?;

    if ctx.quiet {
        return Ok(());
    }
    ui::header(&format!("{} ({})", session.resource.name(), session.resource.group_version_kind()));
    ui::flag("completed", observed.completed);
    ui::flag("exists", observed.exists);
    ui::flag("up to date", observed.up_to_date);
    print_identity(&session);
    ui::secrets(observed.connection_details.keys());
    Ok(())
}

pub fn create(ctx: &Context, args: ResourceArgs) -> Result<()> {
    let mut session = Session::open(ctx, &args.file)?;
    let pb = spinner(ctx, &format!("Creating {}", session.resource.name()));

    let created = loop {
        match session.create() {
            Ok(result) if result.completed => break result,
            Ok(_) => {
                pb.set_message(format!("Creating {} (apply running)", session.resource.name()));
                session.wait(POLL_INTERVAL);
            }
            Err(e) => {
                progress::finish_error(&pb, &format!("Create failed: {e}"));
                session.save()?;
                return Err(e.into());
            }
        }
    };
    session.save()?;

    progress::finish_success(&pb, &format!("Created {}", session.resource.name()));
    if !ctx.quiet {
        ui::flag("external name assigned", created.external_name_assigned);
        print_identity(&session);
        print_secrets(&created.connection_details);
    }
    Ok(())
}

pub fn update(ctx: &Context, args: ResourceArgs) -> Result<()> {
    let mut session = Session::open(ctx, &args.file)?;
    let pb = spinner(ctx, &format!("Updating {}", session.resource.name()));

    let updated = loop {
        match session.update() {
            Ok(result) if result.completed => break result,
            Ok(_) => {
                pb.set_message(format!("Updating {} (apply running)", session.resource.name()));
                session.wait(POLL_INTERVAL);
            }
            Err(e) => {
                progress::finish_error(&pb, &format!("Update failed: {e}"));
                session.save()?;
                return Err(e.into());
            }
        }
    };
    session.save()?;

    progress::finish_success(&pb, &format!("Updated {}", session.resource.name()));
    if !ctx.quiet {
        print_identity(&session);
        print_secrets(&updated.connection_details);
    }
    Ok(())
}

pub fn delete(ctx: &Context, args: ResourceArgs) -> Result<()> {
    let mut session = Session::open(ctx, &args.file)?;
    let pb = spinner(ctx, &format!("Deleting {}", session.resource.name()));

    loop {
        match session.delete() {
            Ok(()) => break,
            Err(reconciler::Error::StillDeleting) => {
                pb.set_message(format!("Deleting {} (destroy running)", session.resource.name()));
                session.wait(POLL_INTERVAL);
            }
            Err(e) => {
                progress::finish_error(&pb, &format!("Delete failed: {e}"));
                return Err(e.into());
            }
        }
    }
    session.clear_remote();
    session.save()?;

    progress::finish_success(&pb, &format!("Deleted {}", session.resource.name()));
    Ok(())
}

fn print_identity(session: &Session) {
    match session.resource.external_name() {
        Some(name) => ui::kv("external name", name),
        None => ui::kv("external name", "-"),
    }
}

fn print_secrets(details: &ConnectionDetails) {
    ui::secrets(details.keys());
}
