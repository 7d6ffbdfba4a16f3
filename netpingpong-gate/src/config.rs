//! Settings read from the process environment.

use std::path::PathBuf;

use constcat::concat;
use time::ext::NumericalStdDuration as _;

use super::*;

pub const ADDRESS_VAR: &str = "NETPong_ADDRESS";
pub const TAINT_VAR: &str = "TAINT_NAME";
pub const NODE_VAR: &str = "NODE_NAME";
pub const INTERVAL_VAR: &str = "PROBE_INTERVAL";

pub const SECRETS_DIR: &str = "/var/run/secrets/netpingpong";
pub const TOKEN_PATH: &str = concat!(SECRETS_DIR, "/token");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var} {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// What a single probe tick acts on.
///
/// Unset variables come through as empty strings; they are not rejected
/// here and surface as failures in whichever step uses them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub address: String,
    pub taint: String,
    pub node: String,
    pub token_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).unwrap_or_default();
        Self {
            address: var(ADDRESS_VAR),
            taint: var(TAINT_VAR),
            node: var(NODE_VAR),
            token_path: PathBuf::from(TOKEN_PATH),
        }
    }

    /// Names of the variables that came through empty.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (ADDRESS_VAR, &self.address),
            (TAINT_VAR, &self.taint),
            (NODE_VAR, &self.node),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(var, _)| var)
        .collect()
    }
}

/// Tick interval from `PROBE_INTERVAL`, defaulting to ten seconds.
pub fn probe_interval() -> Result<Duration, ConfigError> {
    std::env::var(INTERVAL_VAR)
        .ok()
        .filter(|text| !text.is_empty())
        .map_or(Ok(10.std_seconds()), |text| parse_interval(&text))
}

/// Parses a Go-style duration such as `10s` or `1m30s`.
pub fn parse_interval(text: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: INTERVAL_VAR,
        value: text.to_string(),
        reason,
    };
    let nanos = go_parse_duration::parse_duration(text).map_err(|err| invalid(format!("{err:?}")))?;
    match u64::try_from(nanos) {
        Ok(nanos) if nanos > 0 => Ok(Duration::from_nanos(nanos)),
        _ => Err(invalid("must be positive".to_string())),
    }
}
