// SPDX-License-Identifier: MIT

//! Stderr severity parsing (SPEC_FULL.md §4.3): recognizes a `level=` or
//! leading `[INFO]/[WARN]/[ERROR]` convention; everything else is logged at
//! `debug`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Debug,
}

pub fn classify(line: &[u8]) -> Severity {
    let line = String::from_utf8_lossy(line);
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some((tag, _)) = rest.split_once(']') {
            match tag.to_ascii_uppercase().as_str() {
                "INFO" => return Severity::Info,
                "WARN" | "WARNING" => return Severity::Warn,
                "ERROR" | "ERR" => return Severity::Error,
                _ => {}
            }
        }
    }

    for field in trimmed.split_whitespace() {
        if let Some(value) = field.strip_prefix("level=") {
            match value.trim_matches('"').to_ascii_uppercase().as_str() {
                "INFO" => return Severity::Info,
                "WARN" | "WARNING" => return Severity::Warn,
                "ERROR" | "ERR" => return Severity::Error,
                _ => return Severity::Debug,
            }
        }
    }

    Severity::Debug
}

/// Emit `line` on the `tracing` event matching its classified severity.
pub fn log(name: &str, line: &[u8]) {
    let text = String::from_utf8_lossy(line);
    match classify(line) {
        Severity::Info => tracing::info!(integration = name, "{}", text),
        Severity::Warn => tracing::warn!(integration = name, "{}", text),
        Severity::Error => tracing::error!(integration = name, "{}", text),
        Severity::Debug => tracing::debug!(integration = name, "{}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bracket_tags() {
        assert_eq!(classify(b"[INFO] starting up"), Severity::Info);
        assert_eq!(classify(b"[WARN] low disk"), Severity::Warn);
        assert_eq!(classify(b"[ERROR] failed"), Severity::Error);
    }

    #[test]
    fn classifies_level_equals_field() {
        assert_eq!(classify(b"time=now level=warn msg=retrying"), Severity::Warn);
        assert_eq!(classify(b"level=error msg=boom"), Severity::Error);
    }

    #[test]
    fn unrecognized_lines_are_debug() {
        assert_eq!(classify(b"plain line with no marker"), Severity::Debug);
    }
}
