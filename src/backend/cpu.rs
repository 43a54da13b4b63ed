/* src/backend/cpu.rs */
//! # Sequential Fallback Backend
//!
//! Evaluates the same cell kernels as the CUDA entry points, one lattice point
//! at a time. Always available.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use tracing::trace;

use super::{Capability, ComputeBackend, SpectralPair};
use crate::error::DispatchError;
use crate::kernels::evaluate_cell;
use crate::params::{BackendKind, NoiseParams};
use crate::transform::{PlanCache, TransformRequest};

/// Sequential host backend.
#[derive(Debug, Default)]
pub struct FallbackBackend {
    plans: PlanCache,
}

impl FallbackBackend {
    /// Creates the backend with an empty plan cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Noise field without going through the trait; infallible.
    pub fn noise(&self, params: &NoiseParams) -> Vec<f32> {
        let n = params.size.get();
        let mut data = Vec::with_capacity(params.size.total_elements());
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    data.push(evaluate_cell(params, x, y, z));
                }
            }
        }
        trace!(kind = %params.kind, size = n, "sequential noise evaluated");
        data
    }

    /// Transform without going through the trait; infallible for validated requests.
    pub fn transform(&self, request: &TransformRequest) -> SpectralPair {
        let plan = self.plans.plan(request.size);
        let mut re = request.real_part.clone();
        let mut im = request.imag_part.clone();
        plan.execute(&mut re, &mut im, request.direction);
        (re, im)
    }

    /// Sizes with a cached transform plan.
    pub fn cached_plans(&self) -> usize {
        self.plans.len()
    }
}

impl ComputeBackend for FallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CpuFallback
    }

    fn detect_capability(&self) -> Capability {
        Capability::available("host cpu (sequential)")
    }

    fn compute_noise(&self, params: &NoiseParams) -> Result<Vec<f32>, DispatchError> {
        Ok(self.noise(params))
    }

    fn compute_transform(&self, request: &TransformRequest) -> Result<SpectralPair, DispatchError> {
        Ok(self.transform(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{LatticeSize, NoiseKind};

    #[test]
    fn produces_a_full_lattice_in_range() {
        let backend = FallbackBackend::new();
        for kind in [NoiseKind::Gradient, NoiseKind::CellularDistance, NoiseKind::CellularEdge] {
            let params = NoiseParams::new(kind, LatticeSize::S8).with_scale(8.0);
            let data = backend.compute_noise(&params).unwrap();
            assert_eq!(data.len(), 512);
            assert!(data.iter().all(|v| (0.0..=1.0).contains(v)), "{kind} out of range");
        }
    }

    #[test]
    fn gradient_field_is_not_constant() {
        let backend = FallbackBackend::new();
        let params = NoiseParams::new(NoiseKind::Gradient, LatticeSize::S16).with_scale(8.0);
        let data = backend.noise(&params);
        let min = data.iter().cloned().fold(f32::MAX, f32::min);
        let max = data.iter().cloned().fold(f32::MIN, f32::max);
        assert!(max - min > 0.05, "field spread {min}..{max} is too flat");
    }

    #[test]
    fn transform_reuses_plans() {
        let backend = FallbackBackend::new();
        let size = LatticeSize::S8;
        let request = TransformRequest::forward(vec![1.0; 512], vec![0.0; 512], size);
        let (re, _) = backend.compute_transform(&request).unwrap();
        backend.compute_transform(&request).unwrap();
        assert!((re[0] - 512.0).abs() < 1e-3);
        assert_eq!(backend.cached_plans(), 1);
    }

    #[test]
    fn reports_itself_available() {
        let capability = FallbackBackend::new().detect_capability();
        assert!(capability.available);
        assert!(capability.reason.is_none());
    }
}
