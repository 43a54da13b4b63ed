/* src/backend/mod.rs */
#![warn(missing_docs)]
//! # Compute Backends
//!
//! The two interchangeable noise/transform implementations behind one trait:
//! [`gpu::GpuBackend`] (data-parallel CUDA, compiled only with the `cuda`
//! feature) and [`cpu::FallbackBackend`] (sequential nested loops). Backends
//! report failures as [`DispatchError`]; choosing what to do about them is the
//! engine's job.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

pub mod cpu;
pub mod gpu;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, LatticeError};
use crate::params::{BackendKind, NoiseParams};
use crate::transform::TransformRequest;

pub use cpu::FallbackBackend;
pub use gpu::GpuBackend;

/// Result of a capability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Whether the backend can take dispatches
    pub available: bool,
    /// Why the backend is unavailable, when it is
    pub reason: Option<String>,
    /// Human-readable device name, when one was found
    pub device_name: Option<String>,
}

impl Capability {
    /// An available backend.
    pub fn available(device_name: impl Into<String>) -> Self {
        Self { available: true, reason: None, device_name: Some(device_name.into()) }
    }

    /// An unavailable backend and the reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { available: false, reason: Some(reason.into()), device_name: None }
    }

    /// `Ok` when the backend can take dispatches, otherwise
    /// [`LatticeError::CapabilityUnavailable`] carrying the probe's reason.
    ///
    /// The engine only uses this to decide between backends; the error is
    /// never returned from a noise or transform call.
    pub fn ensure_available(&self) -> crate::error::Result<()> {
        if self.available {
            return Ok(());
        }
        Err(LatticeError::CapabilityUnavailable {
            reason: self.reason.clone().unwrap_or_else(|| "no device reported".to_string()),
        })
    }
}

/// Spectral pair returned by a transform dispatch.
pub type SpectralPair = (Vec<f32>, Vec<f32>);

/// A noise and transform compute backend.
///
/// Implementations receive already-validated requests and hold no
/// request-scoped mutable state, so one instance may serve concurrent callers.
pub trait ComputeBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Probes for a usable device. Must not panic and must return within a bounded time.
    fn detect_capability(&self) -> Capability;

    /// Evaluates a `size³` noise field, x fastest then y then z.
    fn compute_noise(&self, params: &NoiseParams) -> Result<Vec<f32>, DispatchError>;

    /// Runs the 3D radix-2 transform and returns `(real, imag)`.
    fn compute_transform(&self, request: &TransformRequest) -> Result<SpectralPair, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_capability_converts_to_error() {
        assert!(Capability::available("test device").ensure_available().is_ok());
        let err = Capability::unavailable("driver missing").ensure_available().unwrap_err();
        assert!(matches!(err, LatticeError::CapabilityUnavailable { ref reason } if reason == "driver missing"));
        assert!(err.to_string().contains("driver missing"));
    }
}
