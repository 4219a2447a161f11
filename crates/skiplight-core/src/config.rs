//! Client configuration and validation
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `SKIPLIGHT_*` environment variables. Validation accumulates every
//! failing field instead of stopping at the first one.

use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SKIPLIGHT_";

/// Local settings of the ledger client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum number of Darc hops followed while resolving delegation
    pub max_delegation_depth: usize,
    /// Blocks to wait for inclusion when the caller does not say
    pub default_wait_blocks: u32,
    /// Extra milliseconds added to the local inclusion deadline
    pub wait_grace_ms: u64,
    /// Largest number of instructions accepted in one transaction
    pub max_instructions: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_delegation_depth: 16,
            default_wait_blocks: 10,
            wait_grace_ms: 2_000,
            max_instructions: 256,
        }
    }
}

impl ClientConfig {
    /// Parse from TOML text; absent keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| LedgerError::config(format!("invalid TOML: {e}")))
    }

    /// Load from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `SKIPLIGHT_<FIELD>` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit variable list
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(field) = key.strip_prefix(ENV_PREFIX) {
                self.set_from_string(&field.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Set one field from its string form
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| LedgerError::config(format!("{key}: cannot parse '{value}'")))
        }

        match key {
            "max_delegation_depth" => self.max_delegation_depth = parse(key, value)?,
            "default_wait_blocks" => self.default_wait_blocks = parse(key, value)?,
            "wait_grace_ms" => self.wait_grace_ms = parse(key, value)?,
            "max_instructions" => self.max_instructions = parse(key, value)?,
            other => {
                tracing::debug!(key = other, "ignoring unknown configuration key");
            }
        }
        Ok(())
    }

    /// Validate every field, reporting all failures together
    pub fn validate(&self) -> Result<()> {
        let mut validator = ConfigValidator::new();
        validator.require_range("max_delegation_depth", self.max_delegation_depth as u64, 1, 64);
        validator.require_range("default_wait_blocks", u64::from(self.default_wait_blocks), 1, 1_000);
        validator.require_range("max_instructions", self.max_instructions as u64, 1, 10_000);
        validator.finish()
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is outside its accepted range
    OutOfRange {
        /// Field name
        field: String,
        /// Smallest accepted value
        min: u64,
        /// Largest accepted value
        max: u64,
        /// Value found
        actual: u64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(f, "'{field}' must be between {min} and {max} (got {actual})"),
        }
    }
}

/// Accumulates validation failures
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
}

impl ConfigValidator {
    /// Create an empty validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `min <= actual <= max`
    pub fn require_range(&mut self, field: &str, actual: u64, min: u64, max: u64) {
        if actual < min || actual > max {
            self.errors.push(ValidationError::OutOfRange {
                field: field.to_string(),
                min,
                max,
                actual,
            });
        }
    }

    /// Collected errors so far
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Succeed if nothing failed, otherwise join every failure into one error
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(LedgerError::config(joined))
    }
}
