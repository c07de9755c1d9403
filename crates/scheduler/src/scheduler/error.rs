use std::path::PathBuf;

use mlfq_core::{CoreError, WorkerId};
use mlfq_dispatch::DispatchError;
use thiserror::Error;

/// Errors that stop the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("dispatch to {worker} failed: {source}")]
    Dispatch {
        worker: WorkerId,
        #[source]
        source: DispatchError,
    },

    #[error("process table: {0}")]
    Table(#[from] CoreError),

    #[error("trace output error: {0}")]
    Trace(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error for {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SchedulerError {
    pub(crate) fn dispatch(worker: WorkerId, source: impl Into<DispatchError>) -> Self {
        SchedulerError::Dispatch { worker, source: source.into() }
    }
}
