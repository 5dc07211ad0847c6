//! Bridge configuration
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PYTHONUNBUFFERED` | unset | `1` makes the runtime's stdout/stderr write-through |
//! | `PYFUNC_RESULT_CAPACITY` | `64` | Fixed result buffer size, terminator included |
//! | `PYFUNC_MAIN_MODULE` | `__main__` | Namespace callables are resolved in |
//!
//! The same settings can be read from a TOML file:
//!
//! ```toml
//! unbuffered = true
//! result_capacity = 128
//! main_module = "__main__"
//! ```

use pyfunc_core::RESULT_CAPACITY;
use serde::Deserialize;
use std::path::Path;

/// Smallest usable result capacity: one byte of text plus the terminator
pub const MIN_RESULT_CAPACITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Force unbuffered stdout/stderr inside the runtime
    pub unbuffered: bool,
    /// Fixed result buffer capacity, terminator included
    pub result_capacity: usize,
    /// Module whose namespace holds every loaded definition
    pub main_module: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            unbuffered: false,
            result_capacity: RESULT_CAPACITY,
            main_module: "__main__".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let unbuffered = std::env::var("PYTHONUNBUFFERED")
            .map(|v| v == "1")
            .unwrap_or(false);

        let result_capacity = std::env::var("PYFUNC_RESULT_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&v: &usize| v >= MIN_RESULT_CAPACITY)
            .unwrap_or(defaults.result_capacity);

        let main_module = std::env::var("PYFUNC_MAIN_MODULE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.main_module);

        Self {
            unbuffered,
            result_capacity,
            main_module,
        }
    }

    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content)
            .map_err(|e| format!("Failed to parse bridge configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            format!(
                "Failed to read bridge configuration '{}': {}",
                path.display(),
                e
            )
        })?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<(), String> {
        if self.result_capacity < MIN_RESULT_CAPACITY {
            return Err(format!(
                "result_capacity must be at least {}, got {}",
                MIN_RESULT_CAPACITY, self.result_capacity
            ));
        }
        if self.main_module.trim().is_empty() {
            return Err("main_module cannot be empty".to_string());
        }
        Ok(())
    }
}
