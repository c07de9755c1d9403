use std::path::{Path, PathBuf};
use std::str::FromStr;

use mlfq_core::config::{active_profile, parse_flag, profiled_env_opt, profiled_env_parse};
use tracing::{info, warn};

use super::types::SchedulerConfig;
use crate::scheduler::error::SchedulerError;

impl SchedulerConfig {
    /// Parse config from a TOML string. Missing keys take their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SchedulerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Defaults, then the optional file, then `MLFQ_*` environment overrides.
    ///
    /// Values are not range-checked here; call [`SchedulerConfig::sanitize`]
    /// once every source (including command-line flags) has been applied.
    pub fn load(path: Option<&Path>) -> Result<Self, SchedulerError> {
        let mut config = match path {
            Some(p) => {
                info!(path = %p.display(), "loading scheduler config");
                Self::from_file(p)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `MLFQ_<FIELD>` overrides `<field>`, and with
    /// `MLFQ_PROFILE=STAGING` the key `STAGING_MLFQ_<FIELD>` wins over it.
    /// Examples:
    /// - `MLFQ_MAX_CONCURRENT` -> `max_concurrent`
    /// - `MLFQ_BASE_QUANTUM_NS` -> `base_quantum_ns`
    /// - `MLFQ_TRACE_PATH` -> `trace_path`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        let p = active_profile();
        let p = p.as_str();
        env_override(p, "MLFQ_MAX_CONCURRENT", &mut self.max_concurrent);
        env_override(p, "MLFQ_MAX_TOTAL", &mut self.max_total);
        env_override(p, "MLFQ_MAX_RUNTIME_SECS", &mut self.max_runtime_secs);
        env_override_opt(p, "MLFQ_MAX_SIM_TIME_NS", &mut self.max_sim_time_ns);
        env_override(p, "MLFQ_BASE_QUANTUM_NS", &mut self.base_quantum_ns);
        env_override(p, "MLFQ_TRACE_INTERVAL_NS", &mut self.trace_interval_ns);
        env_override(p, "MLFQ_IDLE_INCREMENT_NS", &mut self.idle_increment_ns);
        env_override(p, "MLFQ_DISPATCH_OVERHEAD_MIN_NS", &mut self.dispatch_overhead_min_ns);
        env_override(p, "MLFQ_DISPATCH_OVERHEAD_MAX_NS", &mut self.dispatch_overhead_max_ns);
        env_override(p, "MLFQ_MAX_BLOCK_DELAY_NS", &mut self.max_block_delay_ns);
        env_override(p, "MLFQ_DISPATCH_TIMEOUT_MS", &mut self.dispatch_timeout_ms);
        env_override_opt(p, "MLFQ_SEED", &mut self.seed);
        if let Some(v) = profiled_env_opt(p, "MLFQ_TRACE_PATH") {
            self.trace_path = PathBuf::from(v);
        }
        if let Some(v) = profiled_env_opt(p, "MLFQ_TRACE_ENABLED") {
            match parse_flag(&v) {
                Some(flag) => self.trace_enabled = flag,
                None => warn!(key = "MLFQ_TRACE_ENABLED", value = %v, "ignoring environment override"),
            }
        }
    }
}

fn env_override<T: FromStr>(profile: &str, key: &str, field: &mut T) {
    match profiled_env_parse::<T>(profile, key) {
        Ok(Some(v)) => *field = v,
        Ok(None) => {}
        Err(e) => warn!(error = %e, "ignoring environment override"),
    }
}

fn env_override_opt<T: FromStr>(profile: &str, key: &str, field: &mut Option<T>) {
    match profiled_env_parse::<T>(profile, key) {
        Ok(Some(v)) => *field = Some(v),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "ignoring environment override"),
    }
}
