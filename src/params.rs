/* src/params.rs */
//! # Noise Requests and Results
//!
//! Immutable request/response values exchanged with the noise engine.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, Result};

/// Hash seeds are folded below this bound so every one is exact in `f32`.
pub const SEED_RANGE: u32 = 1 << 16;

/// Lattice edge lengths accepted by every backend.
pub const SUPPORTED_SIZES: [u32; 3] = [8, 16, 32];

/// Noise kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseKind {
    /// Fractal sum of gradient noise.
    Gradient,
    /// Distance to the nearest jittered cell point (F1).
    CellularDistance,
    /// Gap between the two nearest cell points (F2 - F1).
    CellularEdge,
}

impl NoiseKind {
    /// Stable lowercase name, as used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseKind::Gradient => "gradient",
            NoiseKind::CellularDistance => "cellular-distance",
            NoiseKind::CellularEdge => "cellular-edge",
        }
    }
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge length of a cubic lattice, restricted to 8, 16 or 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct LatticeSize(u32);

impl LatticeSize {
    /// 8×8×8 lattice.
    pub const S8: LatticeSize = LatticeSize(8);
    /// 16×16×16 lattice.
    pub const S16: LatticeSize = LatticeSize(16);
    /// 32×32×32 lattice.
    pub const S32: LatticeSize = LatticeSize(32);

    /// Validates an edge length.
    pub fn new(size: u32) -> Result<Self> {
        if SUPPORTED_SIZES.contains(&size) {
            Ok(LatticeSize(size))
        } else {
            Err(LatticeError::invalid(format!(
                "unsupported lattice size {size}; supported sizes are 8, 16, 32"
            )))
        }
    }

    /// Edge length.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Number of lattice points, `size³`.
    #[inline]
    pub fn total_elements(self) -> usize {
        let n = self.0 as usize;
        n * n * n
    }

    /// `log2(size)`, the number of butterfly stages per axis.
    #[inline]
    pub fn log2(self) -> u32 {
        self.0.trailing_zeros()
    }
}

impl TryFrom<u32> for LatticeSize {
    type Error = LatticeError;

    fn try_from(value: u32) -> Result<Self> {
        LatticeSize::new(value)
    }
}

impl From<LatticeSize> for u32 {
    fn from(size: LatticeSize) -> u32 {
        size.0
    }
}

impl fmt::Display for LatticeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request for one volumetric noise field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Kernel family
    pub kind: NoiseKind,
    /// Lattice edge length
    pub size: LatticeSize,
    /// Sample-space extent covered by the lattice
    pub scale: f32,
    /// Fractal layers for gradient noise
    pub octaves: u32,
    /// Amplitude falloff per octave, in (0, 1]
    pub persistence: f32,
    /// Hash seed
    #[serde(default)]
    pub seed: u32,
}

impl NoiseParams {
    /// Request with the default shape: scale 4, four octaves, persistence 0.5, seed 0.
    pub fn new(kind: NoiseKind, size: LatticeSize) -> Self {
        Self { kind, size, scale: 4.0, octaves: 4, persistence: 0.5, seed: 0 }
    }

    /// Sets the sample-space scale.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the octave count.
    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.octaves = octaves;
        self
    }

    /// Sets the per-octave persistence.
    pub fn with_persistence(mut self, persistence: f32) -> Self {
        self.persistence = persistence;
        self
    }

    /// Sets the hash seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Fails fast on values outside the documented domain. `octaves == 0` is accepted.
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(LatticeError::invalid(format!(
                "scale must be a finite value greater than 0, got {}",
                self.scale
            )));
        }
        if !self.persistence.is_finite() || self.persistence <= 0.0 || self.persistence > 1.0 {
            return Err(LatticeError::invalid(format!(
                "persistence must lie in (0, 1], got {}",
                self.persistence
            )));
        }
        Ok(())
    }

    /// Seed as seen by the hash: the full `u32` is mixed, then folded into
    /// `[0, SEED_RANGE)` so it adds to cell coordinates without losing bits.
    pub fn hash_seed(&self) -> f32 {
        let mut h = self.seed;
        h ^= h >> 16;
        h = h.wrapping_mul(0x7feb_352d);
        h ^= h >> 15;
        h = h.wrapping_mul(0x846c_a68b);
        h ^= h >> 16;
        (h % SEED_RANGE) as f32
    }

    /// Packs the parameter block uploaded next to the output buffer:
    /// `[scale, octaves, persistence, hash_seed]`.
    pub fn uniforms(&self) -> [f32; 4] {
        [self.scale, self.octaves as f32, self.persistence, self.hash_seed()]
    }
}

/// Backend that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Data-parallel CUDA path.
    #[serde(rename = "gpu")]
    Gpu,
    /// Sequential host path.
    #[serde(rename = "cpu-fallback")]
    CpuFallback,
}

impl BackendKind {
    /// Method tag reported to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Gpu => "gpu",
            BackendKind::CpuFallback => "cpu-fallback",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed noise field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseResult {
    /// `size³` samples in [0, 1], x fastest then y then z
    pub data: Vec<f32>,
    /// Lattice edge length
    pub size: LatticeSize,
    /// `size³`
    pub total_size: usize,
    /// Backend that produced `data`
    pub method: BackendKind,
    /// Wall time of the computation in milliseconds
    pub compute_time_ms: f64,
}

impl NoiseResult {
    /// Sample at lattice coordinate `(x, y, z)`.
    pub fn sample(&self, x: u32, y: u32, z: u32) -> Option<f32> {
        let n = self.size.get();
        if x >= n || y >= n || z >= n {
            return None;
        }
        let (n, x, y, z) = (n as usize, x as usize, y as usize, z as usize);
        self.data.get(z * n * n + y * n + x).copied()
    }

    /// Arithmetic mean of the field.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_size_rejects_unsupported_edges() {
        assert!(LatticeSize::new(8).is_ok());
        assert!(LatticeSize::new(32).is_ok());
        for bad in [0, 4, 12, 64] {
            let err = LatticeSize::new(bad).unwrap_err();
            assert!(err.is_invalid_parameter(), "size {bad} should be rejected");
        }
        assert_eq!(LatticeSize::S16.total_elements(), 4096);
        assert_eq!(LatticeSize::S32.log2(), 5);
    }

    #[test]
    fn lattice_size_deserializes_through_validation() {
        let ok: LatticeSize = serde_json::from_str("16").unwrap();
        assert_eq!(ok, LatticeSize::S16);
        assert!(serde_json::from_str::<LatticeSize>("10").is_err());
    }

    #[test]
    fn params_validation_fails_fast() {
        let base = NoiseParams::new(NoiseKind::Gradient, LatticeSize::S8);
        assert!(base.validate().is_ok());
        assert!(base.clone().with_scale(0.0).validate().is_err());
        assert!(base.clone().with_scale(-2.0).validate().is_err());
        assert!(base.clone().with_scale(f32::NAN).validate().is_err());
        assert!(base.clone().with_persistence(0.0).validate().is_err());
        assert!(base.clone().with_persistence(1.5).validate().is_err());
        assert!(base.clone().with_persistence(1.0).validate().is_ok());
        assert!(base.with_octaves(0).validate().is_ok());
    }

    #[test]
    fn request_json_matches_external_shape() {
        let json = r#"{"kind":"cellular-edge","size":32,"scale":6.0,"octaves":2,"persistence":0.5}"#;
        let params: NoiseParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.kind, NoiseKind::CellularEdge);
        assert_eq!(params.seed, 0);
        assert_eq!(params.uniforms(), [6.0, 2.0, 0.5, 0.0]);
        assert_eq!(serde_json::to_string(&BackendKind::CpuFallback).unwrap(), "\"cpu-fallback\"");
    }

    #[test]
    fn hash_seed_keeps_large_seeds_apart() {
        let with_seed = |seed| NoiseParams::new(NoiseKind::Gradient, LatticeSize::S8).with_seed(seed);
        assert_eq!(with_seed(0).hash_seed(), 0.0);
        assert_ne!(with_seed(1 << 24).hash_seed(), with_seed((1 << 24) + 1).hash_seed());
        assert_ne!(with_seed(0).hash_seed(), with_seed(SEED_RANGE).hash_seed());
        for seed in [1, 7, 1 << 24, 4_000_000_000, u32::MAX] {
            let folded = with_seed(seed).hash_seed();
            assert!((0.0..SEED_RANGE as f32).contains(&folded));
            assert_eq!(folded.fract(), 0.0);
            assert_eq!(with_seed(seed).uniforms()[3], folded);
        }
    }

    #[test]
    fn sample_indexes_x_fastest() {
        let size = LatticeSize::S8;
        let data: Vec<f32> = (0..size.total_elements()).map(|i| i as f32).collect();
        let result = NoiseResult {
            data,
            size,
            total_size: size.total_elements(),
            method: BackendKind::CpuFallback,
            compute_time_ms: 0.0,
        };
        assert_eq!(result.sample(1, 0, 0), Some(1.0));
        assert_eq!(result.sample(0, 1, 0), Some(8.0));
        assert_eq!(result.sample(0, 0, 1), Some(64.0));
        assert_eq!(result.sample(8, 0, 0), None);
    }
}
