//! Check lifecycle orchestration.
//!
//! This module owns polling of running checks and post-check processing such as
//! aggregation, auto-save and exports. CLI command handlers call into this module to
//! keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{watch_check, WatchSettings, WatchTarget};
pub(crate) use post_process::{process_check_completion, process_vgc_completion, OutputTargets};
