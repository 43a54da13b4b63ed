/* src/lib.rs */
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! # Spectral Lattice: Volumetric Noise & Spectral Energy Engine
//!
//! Generates 3D procedural noise lattices on a CUDA backend with a sequential
//! fallback, runs radix-2 transforms over the same lattices, and simulates the
//! frequency-domain energy of spectral objects.
//!
//! ## Core Features
//!
//! - Gradient (fractal), cellular-distance and cellular-edge noise over 8³, 16³ and 32³ lattices
//! - Memoized capability probing with per-call fallback on dispatch failure
//! - 3D radix-2 Cooley–Tukey transform with cached plans
//! - Backend benchmarking with host reports
//! - Parseval energy accounting, coherence loss, fracture checks and energy transfer
//!
//! ```no_run
//! use spectral_lattice::{EngineConfig, LatticeSize, NoiseEngine, NoiseKind, NoiseParams};
//!
//! let engine = NoiseEngine::new(EngineConfig::default())?;
//! let field = engine.compute_noise(&NoiseParams::new(NoiseKind::Gradient, LatticeSize::S16))?;
//! assert_eq!(field.data.len(), 16 * 16 * 16);
//! # Ok::<(), spectral_lattice::LatticeError>(())
//! ```
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

pub mod backend;
pub mod bench;
pub mod config;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod metrics;
pub mod params;
pub mod physics;
pub mod sampler;
pub mod transform;

pub use backend::{Capability, ComputeBackend, FallbackBackend, GpuBackend};
pub use bench::{BenchmarkEntry, BenchmarkReport, BenchmarkSummary, SystemInfo};
pub use config::{BackendPreference, EngineConfig};
pub use engine::NoiseEngine;
pub use error::{DispatchError, LatticeError, Result};
pub use params::{BackendKind, LatticeSize, NoiseKind, NoiseParams, NoiseResult};
pub use transform::{calculate_complex_energy, TransformDirection, TransformRequest, TransformResult};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
        assert!(!version().is_empty());
    }
}
