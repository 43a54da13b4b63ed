/* src/sampler.rs */
//! # Lattice Sampler
//!
//! Hash-based gradient and cellular evaluation over the integer lattice. The
//! CUDA kernels in [`crate::kernels`] carry a line-for-line copy of these
//! formulas; any change here must be mirrored there to keep the two backends
//! statistically equivalent.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::ops::{Add, Mul, Sub};

/// Dot-product constants for the three hash channels.
pub const HASH_KEYS: [[f32; 3]; 3] = [
    [127.1, 311.7, 74.7],
    [269.5, 183.3, 246.1],
    [113.5, 271.9, 124.6],
];

/// Multiplier applied to `sin(q)` before taking the fractional part.
pub const HASH_SCALE: f32 = 43_758.545;

/// Minimal 3-vector used by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Builds a vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Same value in every component.
    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Euclidean length.
    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Component-wise floor.
    #[inline]
    pub fn floor(self) -> Self {
        Self::new(self.x.floor(), self.y.floor(), self.z.floor())
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// `v - floor(v)`; unlike `f32::fract` this stays in [0, 1) for negative input.
#[inline]
pub fn fract(v: f32) -> f32 {
    v - v.floor()
}

/// Maps a lattice cell (plus seed) to three independent values in [0, 1).
#[inline]
pub fn hash3(cell: Vec3, seed: f32) -> Vec3 {
    let channel = |key: [f32; 3]| {
        let q = cell.x * key[0] + cell.y * key[1] + cell.z * key[2] + seed;
        fract(q.sin() * HASH_SCALE)
    };
    Vec3::new(channel(HASH_KEYS[0]), channel(HASH_KEYS[1]), channel(HASH_KEYS[2]))
}

/// Interpolation weight `3t² - 2t³`.
#[inline]
pub fn smooth_weight(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Point in sample space for lattice coordinate `(x, y, z)`.
///
/// Samples sit at cell centres (`+0.5`) so no sample lands on an integer
/// lattice point.
#[inline]
pub fn sample_point(x: u32, y: u32, z: u32, size: u32, scale: f32) -> Vec3 {
    let step = scale / size as f32;
    Vec3::new(
        (x as f32 + 0.5) * step,
        (y as f32 + 0.5) * step,
        (z as f32 + 0.5) * step,
    )
}

/// Single-octave gradient noise, roughly in [-1, 1].
pub fn gradient_noise(p: Vec3, seed: f32) -> f32 {
    let cell = p.floor();
    let f = p - cell;
    let w = Vec3::new(smooth_weight(f.x), smooth_weight(f.y), smooth_weight(f.z));

    let corner = |dx: f32, dy: f32, dz: f32| {
        let offset = Vec3::new(dx, dy, dz);
        let g = hash3(cell + offset, seed) * 2.0 - Vec3::splat(1.0);
        g.dot(f - offset)
    };

    let x00 = lerp(corner(0.0, 0.0, 0.0), corner(1.0, 0.0, 0.0), w.x);
    let x10 = lerp(corner(0.0, 1.0, 0.0), corner(1.0, 1.0, 0.0), w.x);
    let x01 = lerp(corner(0.0, 0.0, 1.0), corner(1.0, 0.0, 1.0), w.x);
    let x11 = lerp(corner(0.0, 1.0, 1.0), corner(1.0, 1.0, 1.0), w.x);
    let y0 = lerp(x00, x10, w.y);
    let y1 = lerp(x01, x11, w.y);
    lerp(y0, y1, w.z)
}

/// Fractal sum of `octaves` gradient layers, normalised by total amplitude.
///
/// With `octaves == 0` the loop body never runs and the normaliser falls back
/// to 1, so the result is 0.
pub fn fractal_noise(p: Vec3, octaves: u32, persistence: f32, seed: f32) -> f32 {
    let mut total = 0.0_f32;
    let mut amplitude = 1.0_f32;
    let mut frequency = 1.0_f32;
    let mut max_amplitude = 0.0_f32;
    for _ in 0..octaves {
        total += gradient_noise(p * frequency, seed) * amplitude;
        max_amplitude += amplitude;
        amplitude *= persistence;
        frequency *= 2.0;
    }
    if octaves == 0 {
        max_amplitude = 1.0;
    }
    total / max_amplitude
}

/// Nearest (`F1`) and second-nearest (`F2`) jittered cell distances.
pub fn cellular_distances(p: Vec3, seed: f32) -> (f32, f32) {
    let cell = p.floor();
    let f = p - cell;
    let mut f1 = f32::MAX;
    let mut f2 = f32::MAX;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let offset = Vec3::new(dx as f32, dy as f32, dz as f32);
                let point = offset + hash3(cell + offset, seed);
                let d = (point - f).length();
                if d < f1 {
                    f2 = f1;
                    f1 = d;
                } else if d < f2 {
                    f2 = d;
                }
            }
        }
    }
    (f1, f2)
}
