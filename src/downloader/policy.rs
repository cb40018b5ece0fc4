// Retry policy loaded from environment-style settings
//
// Retryable error codes come from a densely indexed list ERROR_0, ERROR_1, ...
// that stops at the first missing index. ERROR_RETRY_COUNT and ERROR_RETRY_DELAY
// override the retry budget and base delay when present and parseable.

use std::collections::HashSet;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retryable_codes: HashSet<String>,
    pub max_retries: u32,
    /// Base delay; retry `n` waits `n * retry_delay_base`.
    pub retry_delay_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retryable_codes: HashSet::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_base: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries (single-shot dispatch).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Read the policy from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the policy from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let retryable_codes = (0..)
            .map_while(|index| lookup(&format!("ERROR_{}", index)))
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();

        let max_retries = match lookup("ERROR_RETRY_COUNT") {
            Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
                warn!(value = %raw, "ignoring unparseable ERROR_RETRY_COUNT");
                DEFAULT_MAX_RETRIES
            }),
            None => DEFAULT_MAX_RETRIES,
        };

        let delay_ms = match lookup("ERROR_RETRY_DELAY") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .unwrap_or_else(|| {
                    warn!(value = %raw, "ignoring invalid ERROR_RETRY_DELAY");
                    DEFAULT_RETRY_DELAY_MS
                }),
            None => DEFAULT_RETRY_DELAY_MS,
        };

        Self {
            retryable_codes,
            max_retries,
            retry_delay_base: Duration::from_millis(delay_ms),
        }
    }

    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_delay_base(mut self, base: Duration) -> Self {
        self.retry_delay_base = base;
        self
    }

    pub fn is_retryable_code(&self, code: &str) -> bool {
        self.retryable_codes.contains(code)
    }

    /// Delay before retry `attempt` (1-indexed; the original send is attempt 0).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay_base.saturating_mul(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_settings() {
        let policy = RetryPolicy::from_lookup(lookup_from(&[]));
        assert!(policy.retryable_codes.is_empty());
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay_base, Duration::from_millis(2000));
    }

    #[test]
    fn test_indexed_codes_stop_at_gap() {
        let policy = RetryPolicy::from_lookup(lookup_from(&[
            ("ERROR_0", "error.api.rate_exceeded"),
            ("ERROR_1", "error.api.fetch.fail"),
            ("ERROR_3", "never.read"),
        ]));
        assert_eq!(policy.retryable_codes.len(), 2);
        assert!(policy.is_retryable_code("error.api.rate_exceeded"));
        assert!(policy.is_retryable_code("error.api.fetch.fail"));
        assert!(!policy.is_retryable_code("never.read"));
    }

    #[test]
    fn test_missing_first_index_means_empty_set() {
        let policy = RetryPolicy::from_lookup(lookup_from(&[("ERROR_1", "rate_limited")]));
        assert!(policy.retryable_codes.is_empty());
    }

    #[test]
    fn test_overrides() {
        let policy = RetryPolicy::from_lookup(lookup_from(&[
            ("ERROR_RETRY_COUNT", "5"),
            ("ERROR_RETRY_DELAY", "250"),
        ]));
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.retry_delay_base, Duration::from_millis(250));

        let policy = RetryPolicy::from_lookup(lookup_from(&[
            ("ERROR_RETRY_COUNT", "many"),
            ("ERROR_RETRY_DELAY", "0"),
        ]));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay_base, Duration::from_millis(2000));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default().with_delay_base(Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }
}
