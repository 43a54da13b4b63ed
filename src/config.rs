/* src/config.rs */
//! # Engine Configuration
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, Result};

/// Which backends the engine may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPreference {
    /// Probe the GPU once and use it when available.
    #[default]
    Auto,
    /// Never touch the device; every call runs on the sequential backend.
    CpuOnly,
}

/// Noise engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend selection policy
    pub backend: BackendPreference,
    /// CUDA device ordinal to probe
    pub device_ordinal: usize,
    /// Upper bound on the capability probe, in milliseconds
    pub probe_timeout_ms: u64,
    /// Upper bound on one dispatch including readback, in milliseconds
    pub readback_timeout_ms: u64,
    /// Iterations used by the benchmark harness when none are given
    pub benchmark_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            device_ordinal: 0,
            probe_timeout_ms: 3_000,
            readback_timeout_ms: 5_000,
            benchmark_iterations: 10,
        }
    }
}

impl EngineConfig {
    /// Configuration that never probes the device.
    pub fn cpu_only() -> Self {
        Self { backend: BackendPreference::CpuOnly, ..Self::default() }
    }

    /// Probe timeout as a `Duration`.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Dispatch/readback timeout as a `Duration`.
    pub fn readback_timeout(&self) -> Duration {
        Duration::from_millis(self.readback_timeout_ms)
    }

    /// Rejects settings that would make the engine hang or do nothing.
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_ms == 0 {
            return Err(LatticeError::Configuration(
                "probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.readback_timeout_ms == 0 {
            return Err(LatticeError::Configuration(
                "readback_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.benchmark_iterations == 0 {
            return Err(LatticeError::Configuration(
                "benchmark_iterations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.backend, BackendPreference::Auto);
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = EngineConfig { readback_timeout_ms: 0, ..EngineConfig::default() };
        assert!(matches!(config.validate(), Err(LatticeError::Configuration(_))));

        let config = EngineConfig { probe_timeout_ms: 0, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "backend": "cpu-only", "readback_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.backend, BackendPreference::CpuOnly);
        assert_eq!(config.readback_timeout_ms, 250);
        assert_eq!(config.probe_timeout_ms, 3_000);
    }
}
