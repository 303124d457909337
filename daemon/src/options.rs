//! Load options.
//!
//! Hosts pass a free-form options string with every load. No option has an
//! effect yet, but the string is parsed into a key/value map so options can
//! be given meaning without changing the host protocol. Unknown keys are
//! accepted and ignored.

use std::collections::BTreeMap;

/// Parsed load options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    entries: BTreeMap<String, Option<String>>,
}

impl LoadOptions {
    /// Parse an options string.
    ///
    /// Tokens are separated by whitespace. Each token may start with `:` or
    /// `--` (the styles hosts use for libvlc options) and is either
    /// `key=value` or a bare flag. Later tokens override earlier ones.
    pub fn parse(options: &str) -> Self {
        let mut entries = BTreeMap::new();

        for token in options.split_whitespace() {
            let token = token
                .strip_prefix("--")
                .or_else(|| token.strip_prefix(':'))
                .unwrap_or(token);

            if token.is_empty() {
                continue;
            }

            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    entries.insert(key.to_lowercase(), Some(value.to_string()));
                }
                Some(_) => {
                    log::debug!("Ignoring load option without a key: '{}'", token);
                }
                None => {
                    entries.insert(token.to_lowercase(), None);
                }
            }
        }

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `key` was given, as a flag or with a value
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Value of `key`, `None` for flags and missing keys
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key)?.as_deref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Log every option that has no effect on this backend
    pub fn log_ignored(&self) {
        for key in self.keys() {
            log::debug!("Load option '{}' has no effect, ignoring", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_options() {
        assert!(LoadOptions::parse("").is_empty());
        assert!(LoadOptions::parse("   \t ").is_empty());
    }

    #[test]
    fn test_flags_and_values() {
        let options = LoadOptions::parse(":no-audio --start-time=12.5 fullscreen");
        assert_eq!(options.len(), 3);
        assert!(options.contains("no-audio"));
        assert_eq!(options.get("no-audio"), None);
        assert_eq!(options.get("start-time"), Some("12.5"));
        assert!(options.contains("fullscreen"));
    }

    #[test]
    fn test_later_tokens_override() {
        let options = LoadOptions::parse("rate=1 rate=2");
        assert_eq!(options.len(), 1);
        assert_eq!(options.get("rate"), Some("2"));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let options = LoadOptions::parse(":No-Audio");
        assert!(options.contains("no-audio"));
    }

    #[test]
    fn test_malformed_tokens_are_ignored() {
        let options = LoadOptions::parse("=value : --");
        assert!(options.is_empty());
    }
}
