//! Scheduler configuration: defaults, TOML loading, `MLFQ_*` environment
//! overrides, and range sanitizing.

mod loading;
mod types;
mod validation;


pub use types::SchedulerConfig;
