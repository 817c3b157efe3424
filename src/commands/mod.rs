// Adapter calls against one resource file
pub mod call;
pub mod reconcile;
pub mod session;

// Inspection
pub mod config;
pub mod plan;
pub mod state;

use crate::Context;
use crate::progress;
use indicatif::ProgressBar;

/// Spinner that stays hidden under `--quiet`
pub(crate) fn spinner(ctx: &Context, msg: &str) -> ProgressBar {
    if ctx.quiet {
        ProgressBar::hidden()
    } else {
        progress::spinner(msg)
    }
}
