// SPDX-License-Identifier: MIT

//! Runtime configuration
//!
//! Settings come from the process environment (after `.env` is loaded by
//! the binary); command-line flags override them.

use std::env;
use std::time::Duration;

use super::compiler::Options;
use super::environment::SELECTOR_EXPRESSION_MAX_COST;
use super::error::SelectorError;
use crate::expr::{EnvType, EvalContext};

pub const COST_LIMIT_VAR: &str = "DRA_SELECTOR_COST_LIMIT";
pub const TIMEOUT_MS_VAR: &str = "DRA_SELECTOR_TIMEOUT_MS";
pub const ENV_TYPE_VAR: &str = "DRA_SELECTOR_ENV";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Runtime cost limit for every compiled expression
    pub cost_limit: u64,
    /// Per-device evaluation timeout
    pub timeout: Option<Duration>,
    pub env_type: EnvType,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            cost_limit: SELECTOR_EXPRESSION_MAX_COST,
            timeout: None,
            env_type: EnvType::StoredExpressions,
        }
    }
}

impl SelectorConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, SelectorError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through `lookup`; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SelectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(COST_LIMIT_VAR) {
            config.cost_limit = raw.trim().parse().map_err(|_| {
                SelectorError::config(format!("{} must be a positive integer, got '{}'", COST_LIMIT_VAR, raw))
            })?;
        }

        if let Some(raw) = lookup(TIMEOUT_MS_VAR) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                SelectorError::config(format!("{} must be milliseconds, got '{}'", TIMEOUT_MS_VAR, raw))
            })?;
            config.timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }

        if let Some(raw) = lookup(ENV_TYPE_VAR) {
            config.env_type = raw
                .parse()
                .map_err(|e| SelectorError::config(format!("{}: {}", ENV_TYPE_VAR, e)))?;
        }

        log::debug!("Selector configuration: {:?}", config);
        Ok(config)
    }

    /// Compile options for this configuration
    pub fn options(&self) -> Options {
        Options {
            env_type: Some(self.env_type),
            cost_limit: Some(self.cost_limit),
        }
    }

    /// A fresh evaluation context honouring the timeout
    pub fn eval_context(&self) -> EvalContext {
        match self.timeout {
            Some(timeout) => EvalContext::background().with_timeout(timeout),
            None => EvalContext::background(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::PlatformVersion;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SelectorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SelectorConfig::default());
        assert_eq!(config.cost_limit, SELECTOR_EXPRESSION_MAX_COST);
        assert!(config.eval_context().deadline().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = SelectorConfig::from_lookup(lookup(&[
            (COST_LIMIT_VAR, "500"),
            (TIMEOUT_MS_VAR, "250"),
            (ENV_TYPE_VAR, "1.30"),
        ]))
        .unwrap();
        assert_eq!(config.cost_limit, 500);
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));
        assert_eq!(
            config.env_type,
            EnvType::Version(PlatformVersion::new(1, 30))
        );
        assert!(config.eval_context().deadline().is_some());

        let options = config.options();
        assert_eq!(options.cost_limit, Some(500));
        assert_eq!(options.env_type, Some(config.env_type));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = SelectorConfig::from_lookup(lookup(&[(TIMEOUT_MS_VAR, "0")])).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_invalid_values() {
        let err = SelectorConfig::from_lookup(lookup(&[(COST_LIMIT_VAR, "lots")])).unwrap_err();
        assert!(err.to_string().contains(COST_LIMIT_VAR));

        let err = SelectorConfig::from_lookup(lookup(&[(ENV_TYPE_VAR, "latest")])).unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: DRA_SELECTOR_ENV"));
    }
}
