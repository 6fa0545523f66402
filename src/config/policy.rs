//! Overflow policy for producers facing a full queue.
//!
//! The same parser backs [`QueueConfig`](super::QueueConfig) loading from INI
//! files and any caller that accepts the policy as a string.

use std::{str::FromStr, time::Duration};

use super::ConfigError;

const VALID_POLICIES: &str = "drop, block, timeout:N";

/// Determines how a producer reacts when the queue is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Reject the new item immediately.
    Drop,
    /// Block the producer until space becomes available.
    Block,
    /// Block up to the specified duration before rejecting the item.
    Timeout(Duration),
}

/// Parses a policy string into an [`OverflowPolicy`].
///
/// # Accepted input formats
/// - "drop": Reject new items when the queue is full.
/// - "block": Block until space is available.
/// - "timeout:N": Wait up to N milliseconds before rejecting (N > 0).
///
/// # Errors
/// Returns [`ConfigError::Invalid`] if the input string is not a valid policy.
pub fn parse_policy_string(policy: &str) -> Result<OverflowPolicy, ConfigError> {
    let normalized = policy.trim().to_ascii_lowercase();

    if let Some(rest) = normalized.strip_prefix("timeout:") {
        let ms: i64 = rest.trim().parse().map_err(|_| {
            ConfigError::Invalid("timeout must be a positive integer (N in 'timeout:N')".into())
        })?;
        if ms <= 0 {
            return Err(ConfigError::Invalid(
                "timeout must be greater than zero".into(),
            ));
        }
        return Ok(OverflowPolicy::Timeout(Duration::from_millis(ms as u64)));
    }

    match normalized.as_str() {
        "drop" => Ok(OverflowPolicy::Drop),
        "block" => Ok(OverflowPolicy::Block),
        "timeout" => Err(ConfigError::Invalid(
            "timeout requires a positive integer N, use 'timeout:N'".into(),
        )),
        _ => Err(ConfigError::Invalid(format!(
            "invalid overflow policy '{normalized}'. Valid options are: {VALID_POLICIES}"
        ))),
    }
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_policy_string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: ConfigError) -> String {
        match err {
            ConfigError::Invalid(msg) => msg,
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn parse_policy_string_accepts_drop_whitespace() {
        assert_eq!(parse_policy_string(" drop ").unwrap(), OverflowPolicy::Drop);
    }

    #[test]
    fn parse_policy_string_accepts_block_case_insensitive() {
        assert_eq!(parse_policy_string("BLOCK").unwrap(), OverflowPolicy::Block);
    }

    #[test]
    fn parse_policy_string_parses_timeout_values() {
        assert_eq!(
            "timeout:250".parse::<OverflowPolicy>().unwrap(),
            OverflowPolicy::Timeout(Duration::from_millis(250))
        );
    }

    #[test]
    fn parse_policy_string_reports_missing_timeout_hint() {
        assert_eq!(
            message(parse_policy_string("timeout").unwrap_err()),
            "timeout requires a positive integer N, use 'timeout:N'"
        );
    }

    #[test]
    fn parse_policy_string_rejects_zero_timeout_value() {
        assert_eq!(
            message(parse_policy_string("timeout:0").unwrap_err()),
            "timeout must be greater than zero"
        );
    }

    #[test]
    fn parse_policy_string_rejects_non_numeric_timeout_value() {
        assert_eq!(
            message(parse_policy_string("timeout:abc").unwrap_err()),
            "timeout must be a positive integer (N in 'timeout:N')"
        );
    }

    #[test]
    fn parse_policy_string_rejects_unknown_policy() {
        assert_eq!(
            message(parse_policy_string("unknown").unwrap_err()),
            "invalid overflow policy 'unknown'. Valid options are: drop, block, timeout:N"
        );
    }
}
