use std::env;
use std::str::FromStr;

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Active profile from `MLFQ_PROFILE`, upper-cased (empty = default).
pub fn active_profile() -> String {
    env_opt("MLFQ_PROFILE").unwrap_or_default().to_uppercase()
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
pub fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Read and parse a profiled env var.
///
/// Returns `Ok(None)` when unset and an error when set but unparseable, so
/// callers can decide whether to fall back or fail.
pub fn profiled_env_parse<T: FromStr>(profile: &str, key: &str) -> Result<Option<T>, CoreError> {
    match profiled_env_opt(profile, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CoreError::InvalidEnv { key: key.to_string(), value: raw }),
    }
}

/// Parse a boolean flag in the usual spellings (`1/0`, `true/false`, `yes/no`, `on/off`).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
