//! Controller-style reconciliation of one resource file.
//!
//! Each step observes the resource and then issues at most one of
//! create/update/delete, the way a managed-resource controller would.

use super::session::Session;
use crate::Context;
use crate::cli::ReconcileArgs;
use crate::ui;
use anyhow::{Result, bail};
use colored::Colorize;
use reconciler::{ObserveResult, Terraformed};
use std::time::Duration;

/// What a step does after observing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Observation is not available yet
    Wait,
    Create,
    Update,
    Delete,
    /// The remote object is gone; drop the workspace
    Forget,
    /// Exists and matches the desired state
    Nothing,
}

impl Action {
    pub fn from_observation(observed: &ObserveResult, delete: bool) -> Self {
        if !observed.completed {
            return Self::Wait;
        }
        match (delete, observed.exists, observed.up_to_date) {
            (true, true, _) => Self::Delete,
            (true, false, _) => Self::Forget,
            (false, false, _) => Self::Create,
            (false, true, false) => Self::Update,
            (false, true, true) => Self::Nothing,
        }
    }
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An operation is running; step again later
    Running(String),
    /// The step changed something; step again to confirm
    Changed(String),
    /// Nothing left to do
    Settled(String),
}

impl Outcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }

    fn print(&self, step: u32) {
        let (mark, msg) = match self {
            Self::Running(msg) => ("…".cyan(), msg),
            Self::Changed(msg) => ("↻".yellow(), msg),
            Self::Settled(msg) => ("✓".green(), msg),
        };
        println!("{} {} {}", format!("[{step}]").dimmed(), mark, msg);
    }
}

pub fn run(ctx: &Context, args: ReconcileArgs) -> Result<()> {
    let mut session = Session::open(ctx, &args.file)?;
    let interval = Duration::from_secs(args.interval.max(1));

    if !ctx.quiet {
        ui::header(&format!(
            "Reconciling {} ({})",
            session.resource.name(),
            session.resource.group_version_kind()
        ));
    }

    let mut steps = 0;
    loop {
        steps += 1;
        let outcome = match step(&mut session, args.delete) {
            Ok(outcome) => outcome,
            Err(e) => {
                session.drain();
                session.save()?;
                return Err(e);
            }
        };
        session.save()?;
        if !ctx.quiet {
            outcome.print(steps);
        }

        if outcome.is_settled() || !args.wait {
            break;
        }
        if args.max_steps > 0 && steps >= args.max_steps {
            session.drain();
            bail!("Not settled after {steps} steps");
        }
        if matches!(outcome, Outcome::Running(_)) {
            session.wait(interval);
        }
    }

    if session.is_busy() {
        if !ctx.quiet {
            ui::dim("Waiting for the running operation to end before exiting");
        }
        session.drain();
    }
    Ok(())
}

/// Observe once and act on the observation
pub fn step(session: &mut Session, delete: bool) -> Result<Outcome> {
    let observed = session.observe()?;
    let action = Action::from_observation(&observed, delete);
    log::info!(
        "{}: completed={} exists={} up_to_date={} -> {action:?}",
        session.resource.uid(),
        observed.completed,
        observed.exists,
        observed.up_to_date
    );

    let outcome = match action {
        Action::Wait => Outcome::Running("observation pending".to_string()),
        Action::Nothing => Outcome::Settled("up to date".to_string()),
        Action::Create => match session.create() {
            Ok(created) if created.completed => Outcome::Changed(format!(
                "created {}",
                session.resource.external_name().unwrap_or("-")
            )),
            Ok(_) => Outcome::Running("creating".to_string()),
            Err(e) if e.is_precondition() => Outcome::Running(e.to_string()),
            Err(e) => return Err(e.into()),
        },
        Action::Update => match session.update() {
            Ok(updated) if updated.completed => Outcome::Changed("updated".to_string()),
            Ok(_) => Outcome::Running("updating".to_string()),
            Err(e) if e.is_precondition() => Outcome::Running(e.to_string()),
            Err(e) => return Err(e.into()),
        },
        Action::Delete | Action::Forget => match session.delete() {
            Ok(()) => {
                session.clear_remote();
                Outcome::Settled("deleted".to_string())
            }
            Err(reconciler::Error::StillDeleting) => Outcome::Running("deleting".to_string()),
            Err(e) if e.is_precondition() => Outcome::Running(e.to_string()),
            Err(e) => return Err(e.into()),
        },
    };
    Ok(outcome)
}
