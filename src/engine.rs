/* src/engine.rs */
#![warn(missing_docs)]
//! # Noise Engine
//!
//! The explicit backend handle callers construct once and share by reference.
//! It owns one accelerated backend and the sequential fallback, probes the
//! accelerated one at most once, and turns every dispatch failure into a
//! fallback computation for that single call.
//!
//! ## Selection policy
//!
//! | Probe result            | Dispatch result | Outcome                                 |
//! |-------------------------|-----------------|-----------------------------------------|
//! | unavailable / panicked  | -               | fallback, accelerated never touched     |
//! | available               | ok              | accelerated result                      |
//! | available               | error           | `warn!`, fallback for this call only    |
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::backend::{Capability, ComputeBackend, FallbackBackend, GpuBackend};
use crate::bench::{self, BenchmarkEntry};
use crate::config::{BackendPreference, EngineConfig};
use crate::error::{DispatchError, Result};
use crate::metrics::{counter, histogram};
use crate::params::{BackendKind, NoiseParams, NoiseResult};
use crate::transform::{TransformRequest, TransformResult};

/// Noise and transform entry point with memoized capability probing.
pub struct NoiseEngine {
    config: EngineConfig,
    accelerated: Box<dyn ComputeBackend>,
    fallback: FallbackBackend,
    capability: OnceCell<Capability>,
}

impl std::fmt::Debug for NoiseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseEngine")
            .field("config", &self.config)
            .field("accelerated", &self.accelerated.kind())
            .field("capability", &self.capability.get())
            .finish()
    }
}

impl NoiseEngine {
    /// Builds an engine around the CUDA backend.
    ///
    /// # Arguments
    /// * `config` - Engine configuration; validated before use.
    ///
    /// # Returns
    /// The engine, or a `Configuration` error. No device is touched here.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let accelerated = GpuBackend::new(&config);
        Ok(Self::with_backend(config, Box::new(accelerated)))
    }

    /// Builds an engine around any accelerated backend.
    pub fn with_backend(config: EngineConfig, accelerated: Box<dyn ComputeBackend>) -> Self {
        Self { config, accelerated, fallback: FallbackBackend::new(), capability: OnceCell::new() }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The accelerated backend.
    pub fn accelerated(&self) -> &dyn ComputeBackend {
        self.accelerated.as_ref()
    }

    /// The sequential backend.
    pub fn fallback(&self) -> &FallbackBackend {
        &self.fallback
    }

    /// Accelerated backend capability, probed on first call and memoized.
    ///
    /// A probe that panics is recorded as unavailable.
    pub fn capability(&self) -> &Capability {
        self.capability.get_or_init(|| {
            if self.config.backend == BackendPreference::CpuOnly {
                return Capability::unavailable("backend preference is cpu-only");
            }
            let capability = panic::catch_unwind(AssertUnwindSafe(|| self.accelerated.detect_capability()))
                .unwrap_or_else(|_| Capability::unavailable("capability probe panicked"));
            if capability.available {
                info!(device = ?capability.device_name, "accelerated backend selected");
            } else {
                info!(reason = ?capability.reason, "accelerated backend unavailable; using sequential fallback");
            }
            capability
        })
    }

    /// Generates a noise field.
    ///
    /// Only invalid parameters produce an error; device failures are absorbed
    /// by recomputing on the fallback backend.
    #[instrument(skip(self, params), fields(kind = %params.kind, size = %params.size))]
    pub fn compute_noise(&self, params: &NoiseParams) -> Result<NoiseResult> {
        params.validate()?;
        let started = Instant::now();
        let expected = params.size.total_elements();

        let (data, method) = if self.capability().available {
            let attempt = self.accelerated.compute_noise(params).and_then(|data| {
                if data.len() == expected {
                    Ok(data)
                } else {
                    Err(DispatchError::Readback(format!("expected {expected} values, read back {}", data.len())))
                }
            });
            match attempt {
                Ok(data) => (data, self.accelerated.kind()),
                Err(error) => {
                    self.record_fallback("noise", &error);
                    (self.fallback.noise(params), BackendKind::CpuFallback)
                }
            }
        } else {
            (self.fallback.noise(params), BackendKind::CpuFallback)
        };

        let compute_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        counter!("lattice.engine.noise_requests").increment(1);
        histogram!("lattice.engine.noise_ms").record(compute_time_ms);

        Ok(NoiseResult { data, size: params.size, total_size: expected, method, compute_time_ms })
    }

    /// Runs the 3D radix-2 transform with the same fallback policy as noise.
    #[instrument(skip(self, request), fields(size = %request.size, direction = ?request.direction))]
    pub fn compute_transform(&self, request: &TransformRequest) -> Result<TransformResult> {
        request.validate()?;
        let started = Instant::now();
        let expected = request.size.total_elements();

        let ((real_part, imag_part), method) = if self.capability().available {
            let attempt = self.accelerated.compute_transform(request).and_then(|(re, im)| {
                if re.len() == expected && im.len() == expected {
                    Ok((re, im))
                } else {
                    Err(DispatchError::Readback(format!("expected {expected} values per part")))
                }
            });
            match attempt {
                Ok(pair) => (pair, self.accelerated.kind()),
                Err(error) => {
                    self.record_fallback("transform", &error);
                    (self.fallback.transform(request), BackendKind::CpuFallback)
                }
            }
        } else {
            (self.fallback.transform(request), BackendKind::CpuFallback)
        };

        let compute_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        counter!("lattice.engine.transform_requests").increment(1);
        histogram!("lattice.engine.transform_ms").record(compute_time_ms);

        Ok(TransformResult { real_part, imag_part, method, compute_time_ms })
    }

    /// Times both backends on `params`; see [`bench::run_benchmark`].
    pub fn run_benchmark(&self, params: &NoiseParams, iterations: usize) -> Result<Vec<BenchmarkEntry>> {
        bench::run_benchmark(self, params, iterations)
    }

    fn record_fallback(&self, operation: &'static str, error: &DispatchError) {
        counter!("lattice.engine.fallbacks").increment(1);
        warn!(operation, backend = %self.accelerated.kind(), %error, "dispatch failed; recomputing on sequential fallback");
    }
}
