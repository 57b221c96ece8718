//! Application-level orchestration.
//!
//! This module owns the query lifecycle (submit, poll, supersede) and the
//! processing that follows a completed search, such as building the history
//! record, auto-save and exports. CLI layers call into this module to keep
//! responsibilities separated.

mod controller;
mod lifecycle;
mod post_process;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use post_process::{build_record, process_completion};
