/* src/transform.rs */
//! # Radix-2 Transform
//!
//! Three-dimensional Cooley–Tukey transform over a `size³` complex lattice,
//! performed as radix-2 passes along x, then y, then z. Each pass is a
//! bit-reversal permutation followed by `log2(size)` butterfly stages; the
//! GPU backend dispatches exactly these steps one kernel launch at a time, and
//! the sequential path here runs them in loops with the same indexing.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::f32::consts::TAU;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, Result};
use crate::kernels::axis_index;
use crate::metrics::{gauge, Gauge};
use crate::params::{BackendKind, LatticeSize};

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransformDirection {
    /// Space to frequency.
    #[default]
    Forward,
    /// Frequency to space, normalised by `1/size` per axis.
    Inverse,
}

impl TransformDirection {
    /// `+1` forward, `-1` inverse; multiplies the twiddle angle.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            TransformDirection::Forward => 1.0,
            TransformDirection::Inverse => -1.0,
        }
    }
}

/// A transform request over a `size³` complex lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// Real parts, length `size³`
    pub real_part: Vec<f32>,
    /// Imaginary parts, length `size³`
    pub imag_part: Vec<f32>,
    /// Lattice edge length
    pub size: LatticeSize,
    /// Forward or inverse
    #[serde(default)]
    pub direction: TransformDirection,
}

impl TransformRequest {
    /// Forward transform request.
    pub fn forward(real_part: Vec<f32>, imag_part: Vec<f32>, size: LatticeSize) -> Self {
        Self { real_part, imag_part, size, direction: TransformDirection::Forward }
    }

    /// Inverse transform request.
    pub fn inverse(real_part: Vec<f32>, imag_part: Vec<f32>, size: LatticeSize) -> Self {
        Self { real_part, imag_part, size, direction: TransformDirection::Inverse }
    }

    /// Checks both arrays hold exactly `size³` values.
    pub fn validate(&self) -> Result<()> {
        let expected = self.size.total_elements();
        if self.real_part.len() != expected {
            return Err(LatticeError::invalid(format!(
                "invalid input length: expected {expected}, got {} (real)",
                self.real_part.len()
            )));
        }
        if self.imag_part.len() != expected {
            return Err(LatticeError::invalid(format!(
                "invalid input length: expected {expected}, got {} (imag)",
                self.imag_part.len()
            )));
        }
        Ok(())
    }
}

/// Output of a transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    /// Real parts
    pub real_part: Vec<f32>,
    /// Imaginary parts
    pub imag_part: Vec<f32>,
    /// Backend that produced the result
    pub method: BackendKind,
    /// Wall time in milliseconds
    pub compute_time_ms: f64,
}

impl TransformResult {
    /// `[re0, im0, re1, im1, ...]`.
    pub fn interleaved(&self) -> Vec<f32> {
        self.real_part
            .iter()
            .zip(&self.imag_part)
            .flat_map(|(&re, &im)| [re, im])
            .collect()
    }

    /// Parseval energy of the output coefficients.
    pub fn energy(&self) -> f64 {
        complex_energy_unchecked(&self.real_part, &self.imag_part)
    }
}

/// Precomputed tables for one lattice edge.
#[derive(Debug)]
pub struct TransformPlan {
    size: usize,
    log2: u32,
    bit_reverse: Vec<usize>,
    /// `twiddles[stage][j]` = (cos, sin) of the forward angle `-2π·j/group`.
    twiddles: Vec<Vec<(f32, f32)>>,
}

impl TransformPlan {
    /// Builds the plan for `size`.
    pub fn new(size: LatticeSize) -> Self {
        let n = size.get() as usize;
        let log2 = size.log2();
        let bit_reverse = (0..n)
            .map(|i| (i as u32).reverse_bits().wrapping_shr(32 - log2) as usize)
            .collect();
        let twiddles = (0..log2)
            .map(|stage| {
                let half = 1usize << stage;
                let group = half << 1;
                (0..half)
                    .map(|j| {
                        let angle = -TAU * j as f32 / group as f32;
                        (angle.cos(), angle.sin())
                    })
                    .collect()
            })
            .collect();
        Self { size: n, log2, bit_reverse, twiddles }
    }

    /// Edge length this plan serves.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs the full 3D transform in place.
    pub fn execute(&self, re: &mut [f32], im: &mut [f32], direction: TransformDirection) {
        let mut scratch_re = vec![0.0_f32; re.len()];
        let mut scratch_im = vec![0.0_f32; im.len()];
        for axis in 0..3 {
            self.bit_reverse_axis(re, im, &mut scratch_re, &mut scratch_im, axis);
            re.copy_from_slice(&scratch_re);
            im.copy_from_slice(&scratch_im);
            for stage in 0..self.log2 {
                let scale = if direction == TransformDirection::Inverse && stage + 1 == self.log2 {
                    1.0 / self.size as f32
                } else {
                    1.0
                };
                self.butterfly_stage(re, im, axis, stage, direction, scale);
            }
        }
    }

    fn bit_reverse_axis(&self, src_re: &[f32], src_im: &[f32], dst_re: &mut [f32], dst_im: &mut [f32], axis: usize) {
        let n = self.size;
        for line in 0..n * n {
            for i in 0..n {
                let from = axis_index(line, i, n, axis);
                let to = axis_index(line, self.bit_reverse[i], n, axis);
                dst_re[to] = src_re[from];
                dst_im[to] = src_im[from];
            }
        }
    }

    fn butterfly_stage(&self, re: &mut [f32], im: &mut [f32], axis: usize, stage: u32, direction: TransformDirection, scale: f32) {
        let n = self.size;
        let half = 1usize << stage;
        let group = half << 1;
        let sign = direction.sign();
        for line in 0..n * n {
            for k in 0..n / 2 {
                let j = k % half;
                let top_pos = (k / half) * group + j;
                let top = axis_index(line, top_pos, n, axis);
                let bottom = axis_index(line, top_pos + half, n, axis);
                let (wr, wi_forward) = self.twiddles[stage as usize][j];
                let wi = wi_forward * sign;
                let br = re[bottom] * wr - im[bottom] * wi;
                let bi = re[bottom] * wi + im[bottom] * wr;
                let (tr, ti) = (re[top], im[top]);
                re[top] = (tr + br) * scale;
                im[top] = (ti + bi) * scale;
                re[bottom] = (tr - br) * scale;
                im[bottom] = (ti - bi) * scale;
            }
        }
    }
}

/// Per-size plan cache; a plan is built the first time a size is requested.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: DashMap<LatticeSize, Arc<TransformPlan>>,
}

impl PlanCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached plan for `size`, building it on first use.
    pub fn plan(&self, size: LatticeSize) -> Arc<TransformPlan> {
        if let Some(plan) = self.plans.get(&size) {
            return Arc::clone(&plan);
        }
        let plan = Arc::clone(&self.plans.entry(size).or_insert_with(|| Arc::new(TransformPlan::new(size))));
        cached_plans_gauge().set(self.plans.len() as f64);
        plan
    }

    /// Number of plans built so far.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// True when no plan has been built.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

fn cached_plans_gauge() -> &'static Gauge {
    gauge!("lattice.transform.cached_plans")
}

/// Total energy of complex coefficients: Σ(re² + im²).
pub fn calculate_complex_energy(real: &[f32], imag: &[f32]) -> Result<f64> {
    if real.len() != imag.len() {
        return Err(LatticeError::invalid(format!(
            "real and imaginary arrays must have the same length ({} vs {})",
            real.len(),
            imag.len()
        )));
    }
    Ok(complex_energy_unchecked(real, imag))
}

fn complex_energy_unchecked(real: &[f32], imag: &[f32]) -> f64 {
    real.iter()
        .zip(imag)
        .map(|(&re, &im)| f64::from(re) * f64::from(re) + f64::from(im) * f64::from(im))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(size: LatticeSize) -> (Vec<f32>, Vec<f32>) {
        let mut re = vec![0.0; size.total_elements()];
        re[0] = 1.0;
        (re, vec![0.0; size.total_elements()])
    }

    #[test]
    fn impulse_transforms_to_flat_spectrum() {
        let size = LatticeSize::S8;
        let (mut re, mut im) = impulse(size);
        TransformPlan::new(size).execute(&mut re, &mut im, TransformDirection::Forward);
        for (r, i) in re.iter().zip(&im) {
            assert!((r - 1.0).abs() < 1e-5);
            assert!(i.abs() < 1e-5);
        }
    }

    #[test]
    fn inverse_recovers_the_impulse() {
        let size = LatticeSize::S8;
        let plan = TransformPlan::new(size);
        let (mut re, mut im) = impulse(size);
        plan.execute(&mut re, &mut im, TransformDirection::Forward);
        plan.execute(&mut re, &mut im, TransformDirection::Inverse);
        assert!((re[0] - 1.0).abs() < 1e-5, "expected ~1.0, got {}", re[0]);
        for i in 1..size.total_elements() {
            assert!(re[i].abs() < 1e-5, "expected ~0.0 at {i}, got {}", re[i]);
            assert!(im[i].abs() < 1e-5);
        }
    }

    #[test]
    fn constant_field_concentrates_in_dc() {
        let size = LatticeSize::S16;
        let n = size.total_elements();
        let mut re = vec![1.0; n];
        let mut im = vec![0.0; n];
        TransformPlan::new(size).execute(&mut re, &mut im, TransformDirection::Forward);
        assert!((re[0] - n as f32).abs() < 1e-2);
        assert!(re[1..].iter().all(|v| v.abs() < 1e-2));
    }

    #[test]
    fn single_axis_cosine_lands_in_matching_bins() {
        let size = LatticeSize::S8;
        let n = size.get() as usize;
        let mut re = vec![0.0_f32; size.total_elements()];
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    re[(z * n + y) * n + x] = (TAU * x as f32 / n as f32).cos();
                }
            }
        }
        let mut im = vec![0.0; re.len()];
        TransformPlan::new(size).execute(&mut re, &mut im, TransformDirection::Forward);
        let half_energy = (n * n * n / 2) as f32;
        assert!((re[1] - half_energy).abs() < 1e-2);
        assert!((re[n - 1] - half_energy).abs() < 1e-2);
        assert!(re[2].abs() < 1e-2);
    }

    #[test]
    fn parseval_holds_across_the_transform() {
        let size = LatticeSize::S8;
        let n = size.total_elements();
        let mut re: Vec<f32> = (0..n).map(|i| ((i * 37 % 11) as f32 - 5.0) * 0.1).collect();
        let mut im = vec![0.0; n];
        let spatial = calculate_complex_energy(&re, &im).unwrap();
        TransformPlan::new(size).execute(&mut re, &mut im, TransformDirection::Forward);
        let spectral = calculate_complex_energy(&re, &im).unwrap() / n as f64;
        assert!((spatial - spectral).abs() < 1e-3 * spatial.max(1.0));
    }

    #[test]
    fn complex_energy_matches_hand_values() {
        assert!((calculate_complex_energy(&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0]).unwrap() - 14.0).abs() < 1e-9);
        assert!((calculate_complex_energy(&[3.0, 0.0], &[4.0, 5.0]).unwrap() - 50.0).abs() < 1e-9);
        assert!(calculate_complex_energy(&[1.0], &[]).is_err());
    }

    #[test]
    fn request_validation_checks_lengths() {
        let size = LatticeSize::S8;
        let ok = TransformRequest::forward(vec![0.0; 512], vec![0.0; 512], size);
        assert!(ok.validate().is_ok());
        let short = TransformRequest::forward(vec![0.0; 500], vec![0.0; 512], size);
        assert!(short.validate().unwrap_err().is_invalid_parameter());
        let bad_imag = TransformRequest::inverse(vec![0.0; 512], vec![0.0; 8], size);
        assert!(bad_imag.validate().is_err());
    }

    #[test]
    fn plan_cache_builds_once_per_size() {
        let cache = PlanCache::new();
        let a = cache.plan(LatticeSize::S8);
        let b = cache.plan(LatticeSize::S8);
        assert!(Arc::ptr_eq(&a, &b));
        cache.plan(LatticeSize::S32);
        assert_eq!(cache.len(), 2);
        assert!(cached_plans_gauge().get() >= 1.0);
    }

    #[test]
    fn interleaved_output_alternates_parts() {
        let result = TransformResult {
            real_part: vec![1.0, 3.0],
            imag_part: vec![2.0, 4.0],
            method: BackendKind::CpuFallback,
            compute_time_ms: 0.0,
        };
        assert_eq!(result.interleaved(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!((result.energy() - 30.0).abs() < 1e-9);
    }
}
