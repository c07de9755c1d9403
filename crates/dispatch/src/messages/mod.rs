//! Payloads and topics of the scheduler/worker dispatch protocol.
//!
//! - **Dispatch messages** (`dispatch`): quantum grants, usage replies, and
//!   the decoded [`dispatch::Outcome`]
//! - **Topic constants** (`topics`): canonical topic strings

pub mod dispatch;
pub mod topics;
