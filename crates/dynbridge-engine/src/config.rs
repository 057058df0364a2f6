//! Bridge configuration

use once_cell::sync::Lazy;

/// Environment variable that switches the interpreter off at run time
pub const ENV_INTERPRETER: &str = "DYNBRIDGE_INTERPRETER";

/// Environment variable overriding [`BridgeConfig::leak_warn_threshold`]
pub const ENV_LEAK_WARN: &str = "DYNBRIDGE_LEAK_WARN";

/// Configuration for the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Run-time half of the capability gate (default: true)
    pub interpreter_enabled: bool,
    /// Warn when one compile request leaves more than this many view
    /// handles live (default: 16)
    pub leak_warn_threshold: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            interpreter_enabled: true,
            leak_warn_threshold: 16,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `DYNBRIDGE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = BridgeConfig::default();

        if let Some(raw) = lookup(ENV_INTERPRETER) {
            match parse_switch(&raw) {
                Some(enabled) => config.interpreter_enabled = enabled,
                None => tracing::warn!(
                    key = ENV_INTERPRETER,
                    value = %raw,
                    "ignoring unrecognized switch"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_LEAK_WARN) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.leak_warn_threshold = n,
                Err(_) => tracing::warn!(
                    key = ENV_LEAK_WARN,
                    value = %raw,
                    "ignoring non-numeric threshold"
                ),
            }
        }

        config
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

static GLOBAL: Lazy<BridgeConfig> = Lazy::new(BridgeConfig::from_env);

/// Process-wide configuration, read from the environment on first use
pub fn global() -> &'static BridgeConfig {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_lookup(lookup(&[]));
        assert_eq!(config, BridgeConfig::default());
        assert!(config.interpreter_enabled);
        assert_eq!(config.leak_warn_threshold, 16);
    }

    #[test]
    fn test_interpreter_switch() {
        for off in ["0", "false", "OFF", " no "] {
            let config = BridgeConfig::from_lookup(lookup(&[(ENV_INTERPRETER, off)]));
            assert!(!config.interpreter_enabled, "{off:?} should disable");
        }
        let config = BridgeConfig::from_lookup(lookup(&[(ENV_INTERPRETER, "on")]));
        assert!(config.interpreter_enabled);
    }

    #[test]
    fn test_bad_values_ignored() {
        let config = BridgeConfig::from_lookup(lookup(&[
            (ENV_INTERPRETER, "maybe"),
            (ENV_LEAK_WARN, "lots"),
        ]));
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_leak_threshold() {
        let config = BridgeConfig::from_lookup(lookup(&[(ENV_LEAK_WARN, "3")]));
        assert_eq!(config.leak_warn_threshold, 3);
    }
}
