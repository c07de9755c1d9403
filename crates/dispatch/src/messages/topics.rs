//! Topic constants for dispatch messages.
//!
//! Topics follow the pattern `mlfq.<party>.<event>`.

/// Scheduler grants a quantum to one worker.
pub const DISPATCH_REQUEST: &str = "mlfq.dispatch.request";

/// Worker reports how much of the quantum it used and why it stopped.
pub const DISPATCH_REPLY: &str = "mlfq.dispatch.reply";
