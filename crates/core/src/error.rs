// SPDX-License-Identifier: MIT

//! Error taxonomy for the data model layer.
//!
//! Mirrors the teacher's `LifecycleError`/`ExecuteError` shape: one
//! `thiserror`-derived enum per crate boundary, composed with `#[from]`
//! where a lower layer's error is meaningful to report as-is.

use thiserror::Error;

/// Errors building or validating a [`crate::definition::Definition`].
///
/// These are *Configuration* errors per SPEC_FULL.md §7: reported at load
/// time, the offending definition is skipped, and the caller logs at `warn`
/// with the file name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("invalid inventory source {0:?}: expected \"category/term\"")]
    InvalidInventorySource(String),

    #[error("invalid duration {0:?}: {1}")]
    InvalidDuration(String, String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("neither `exec`, `integration_name`, nor a resolvable executable for `name`")]
    NoExecutable,
}

/// Parse a duration string of the shape `"<number><suffix>"` where suffix is
/// one of `ms`, `s`/`sec`/`second(s)`, `m`/`min`/`minute(s)`, `h`/`hr`/`hour(s)`,
/// `d`/`day(s)`, or empty (defaults to seconds).
pub fn parse_duration(s: &str) -> Result<std::time::Duration, ConfigError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration(s.to_string(), "empty duration string".into()));
    }

    let (num_str, suffix) = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&trimmed[..i], &trimmed[i..]))
        .unwrap_or((trimmed, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(s.to_string(), "invalid number".into()))?;

    match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            Ok(std::time::Duration::from_millis(num))
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => {
            Ok(std::time::Duration::from_secs(num))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            Ok(std::time::Duration::from_secs(num * 60))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => Ok(std::time::Duration::from_secs(num * 3600)),
        "d" | "day" | "days" => Ok(std::time::Duration::from_secs(num * 86400)),
        other => Err(ConfigError::InvalidDuration(
            s.to_string(),
            format!("unknown duration suffix: {}", other),
        )),
    }
}
