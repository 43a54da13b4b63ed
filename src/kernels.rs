/* src/kernels.rs */
//! # Kernel Library
//!
//! Three noise kernels and the radix-2 transform kernels, each in two forms:
//! CUDA C source compiled at runtime through NVRTC for the GPU backend, and a
//! per-cell host function the sequential backend calls in nested loops. Both
//! forms evaluate the formulas of [`crate::sampler`].
//!
//! ## Launch geometry
//!
//! Noise kernels run one thread per lattice point in 8×8×8 blocks, so a lattice
//! of edge `n` launches `ceil(n/8)` blocks per dimension. Transform kernels are
//! one-dimensional launches over `n³` (bit reversal) or `n³/2` (butterflies)
//! threads.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::{NoiseKind, NoiseParams};
use crate::sampler::{cellular_distances, fractal_noise, sample_point};

/// Edge of the cubic thread block used by the noise kernels.
pub const WORKGROUP_DIM: u32 = 8;

/// Threads per block for the one-dimensional transform kernels.
pub const TRANSFORM_BLOCK: u32 = 256;

/// Identity of a compiled kernel module; one module per kind is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    /// Fractal gradient noise.
    GradientNoise,
    /// Cellular F1 distance.
    CellularDistance,
    /// Cellular F2 - F1 edge.
    CellularEdge,
    /// Bit reversal and butterfly stages of the radix-2 transform.
    Transform,
}

impl KernelKind {
    /// Every kernel module in the library.
    pub const ALL: [KernelKind; 4] = [
        KernelKind::GradientNoise,
        KernelKind::CellularDistance,
        KernelKind::CellularEdge,
        KernelKind::Transform,
    ];

    /// Module that evaluates a noise family.
    pub fn for_noise(kind: NoiseKind) -> Self {
        match kind {
            NoiseKind::Gradient => KernelKind::GradientNoise,
            NoiseKind::CellularDistance => KernelKind::CellularDistance,
            NoiseKind::CellularEdge => KernelKind::CellularEdge,
        }
    }

    /// Name of the primary `extern "C"` entry point.
    pub fn entry_point(&self) -> &'static str {
        match self {
            KernelKind::GradientNoise => "gradient_noise_kernel",
            KernelKind::CellularDistance => "cellular_distance_kernel",
            KernelKind::CellularEdge => "cellular_edge_kernel",
            KernelKind::Transform => BUTTERFLY_ENTRY,
        }
    }

    /// Complete CUDA C translation unit for this module.
    pub fn source(&self) -> &'static str {
        match self {
            KernelKind::GradientNoise => GRADIENT_NOISE_SOURCE,
            KernelKind::CellularDistance => CELLULAR_DISTANCE_SOURCE,
            KernelKind::CellularEdge => CELLULAR_EDGE_SOURCE,
            KernelKind::Transform => TRANSFORM_SOURCE,
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

/// Entry point of the bit-reversal permutation.
pub const BIT_REVERSE_ENTRY: &str = "bit_reverse_kernel";

/// Entry point of one butterfly stage.
pub const BUTTERFLY_ENTRY: &str = "butterfly_kernel";

// =====================================================================================
// CUDA SOURCES
// =====================================================================================

macro_rules! sampler_prelude {
    () => {
        r#"
#define HASH_SCALE 43758.545f
#define FLOAT_MAX 3.402823466e+38f

__device__ __forceinline__ float fract_f(float v) { return v - floorf(v); }

__device__ __forceinline__ float3 hash3(float3 c, float seed) {
    float q0 = c.x * 127.1f + c.y * 311.7f + c.z * 74.7f + seed;
    float q1 = c.x * 269.5f + c.y * 183.3f + c.z * 246.1f + seed;
    float q2 = c.x * 113.5f + c.y * 271.9f + c.z * 124.6f + seed;
    return make_float3(fract_f(sinf(q0) * HASH_SCALE),
                       fract_f(sinf(q1) * HASH_SCALE),
                       fract_f(sinf(q2) * HASH_SCALE));
}

__device__ __forceinline__ float smooth_weight(float t) { return t * t * (3.0f - 2.0f * t); }

__device__ __forceinline__ float lerp_f(float a, float b, float t) { return a + (b - a) * t; }

__device__ __forceinline__ float clamp01(float v) { return fminf(fmaxf(v, 0.0f), 1.0f); }

__device__ __forceinline__ float corner_dot(float3 cell, float3 f, float dx, float dy, float dz, float seed) {
    float3 h = hash3(make_float3(cell.x + dx, cell.y + dy, cell.z + dz), seed);
    return (h.x * 2.0f - 1.0f) * (f.x - dx)
         + (h.y * 2.0f - 1.0f) * (f.y - dy)
         + (h.z * 2.0f - 1.0f) * (f.z - dz);
}

__device__ float gradient_noise(float3 p, float seed) {
    float3 cell = make_float3(floorf(p.x), floorf(p.y), floorf(p.z));
    float3 f = make_float3(p.x - cell.x, p.y - cell.y, p.z - cell.z);
    float wx = smooth_weight(f.x);
    float wy = smooth_weight(f.y);
    float wz = smooth_weight(f.z);
    float x00 = lerp_f(corner_dot(cell, f, 0.0f, 0.0f, 0.0f, seed), corner_dot(cell, f, 1.0f, 0.0f, 0.0f, seed), wx);
    float x10 = lerp_f(corner_dot(cell, f, 0.0f, 1.0f, 0.0f, seed), corner_dot(cell, f, 1.0f, 1.0f, 0.0f, seed), wx);
    float x01 = lerp_f(corner_dot(cell, f, 0.0f, 0.0f, 1.0f, seed), corner_dot(cell, f, 1.0f, 0.0f, 1.0f, seed), wx);
    float x11 = lerp_f(corner_dot(cell, f, 0.0f, 1.0f, 1.0f, seed), corner_dot(cell, f, 1.0f, 1.0f, 1.0f, seed), wx);
    return lerp_f(lerp_f(x00, x10, wy), lerp_f(x01, x11, wy), wz);
}

__device__ float fractal_noise(float3 p, unsigned int octaves, float persistence, float seed) {
    float total = 0.0f;
    float amplitude = 1.0f;
    float frequency = 1.0f;
    float max_amplitude = 0.0f;
    for (unsigned int o = 0; o < octaves; ++o) {
        total += gradient_noise(make_float3(p.x * frequency, p.y * frequency, p.z * frequency), seed) * amplitude;
        max_amplitude += amplitude;
        amplitude *= persistence;
        frequency *= 2.0f;
    }
    if (octaves == 0) {
        max_amplitude = 1.0f;
    }
    return total / max_amplitude;
}

__device__ void cellular_distances(float3 p, float seed, float* f1_out, float* f2_out) {
    float3 cell = make_float3(floorf(p.x), floorf(p.y), floorf(p.z));
    float3 f = make_float3(p.x - cell.x, p.y - cell.y, p.z - cell.z);
    float f1 = FLOAT_MAX;
    float f2 = FLOAT_MAX;
    for (int dz = -1; dz <= 1; ++dz) {
        for (int dy = -1; dy <= 1; ++dy) {
            for (int dx = -1; dx <= 1; ++dx) {
                float3 offset = make_float3((float)dx, (float)dy, (float)dz);
                float3 h = hash3(make_float3(cell.x + offset.x, cell.y + offset.y, cell.z + offset.z), seed);
                float px = offset.x + h.x - f.x;
                float py = offset.y + h.y - f.y;
                float pz = offset.z + h.z - f.z;
                float d = sqrtf(px * px + py * py + pz * pz);
                if (d < f1) {
                    f2 = f1;
                    f1 = d;
                } else if (d < f2) {
                    f2 = d;
                }
            }
        }
    }
    *f1_out = f1;
    *f2_out = f2;
}

__device__ __forceinline__ bool lattice_coord(unsigned int size, unsigned int* x, unsigned int* y, unsigned int* z) {
    *x = blockIdx.x * blockDim.x + threadIdx.x;
    *y = blockIdx.y * blockDim.y + threadIdx.y;
    *z = blockIdx.z * blockDim.z + threadIdx.z;
    return *x < size && *y < size && *z < size;
}

__device__ __forceinline__ float3 sample_point(unsigned int x, unsigned int y, unsigned int z, unsigned int size, float scale) {
    float step = scale / (float)size;
    return make_float3(((float)x + 0.5f) * step, ((float)y + 0.5f) * step, ((float)z + 0.5f) * step);
}
"#
    };
}

/// `params` = `[scale, octaves, persistence, hash_seed]`.
const GRADIENT_NOISE_SOURCE: &str = concat!(
    sampler_prelude!(),
    r#"
extern "C" __global__ void gradient_noise_kernel(float* out, const float* params, unsigned int size) {
    unsigned int x, y, z;
    if (!lattice_coord(size, &x, &y, &z)) return;
    float3 p = sample_point(x, y, z, size, params[0]);
    float n = fractal_noise(p, (unsigned int)params[1], params[2], params[3]);
    out[(z * size + y) * size + x] = clamp01(n * 0.5f + 0.5f);
}
"#
);

const CELLULAR_DISTANCE_SOURCE: &str = concat!(
    sampler_prelude!(),
    r#"
extern "C" __global__ void cellular_distance_kernel(float* out, const float* params, unsigned int size) {
    unsigned int x, y, z;
    if (!lattice_coord(size, &x, &y, &z)) return;
    float3 p = sample_point(x, y, z, size, params[0]);
    float f1, f2;
    cellular_distances(p, params[3], &f1, &f2);
    out[(z * size + y) * size + x] = clamp01(f1);
}
"#
);

const CELLULAR_EDGE_SOURCE: &str = concat!(
    sampler_prelude!(),
    r#"
extern "C" __global__ void cellular_edge_kernel(float* out, const float* params, unsigned int size) {
    unsigned int x, y, z;
    if (!lattice_coord(size, &x, &y, &z)) return;
    float3 p = sample_point(x, y, z, size, params[0]);
    float f1, f2;
    cellular_distances(p, params[3], &f1, &f2);
    out[(z * size + y) * size + x] = clamp01(f2 - f1);
}
"#
);

const TRANSFORM_SOURCE: &str = r#"
__device__ __forceinline__ unsigned int axis_index(unsigned int line, unsigned int i, unsigned int n, unsigned int axis) {
    unsigned int a = line % n;
    unsigned int b = line / n;
    if (axis == 0) return (b * n + a) * n + i;
    if (axis == 1) return (b * n + i) * n + a;
    return (i * n + b) * n + a;
}

extern "C" __global__ void bit_reverse_kernel(const float* src_re, const float* src_im,
                                              float* dst_re, float* dst_im,
                                              unsigned int n, unsigned int log2n, unsigned int axis) {
    unsigned int t = blockIdx.x * blockDim.x + threadIdx.x;
    if (t >= n * n * n) return;
    unsigned int line = t / n;
    unsigned int i = t % n;
    unsigned int r = __brev(i) >> (32 - log2n);
    unsigned int from = axis_index(line, i, n, axis);
    unsigned int to = axis_index(line, r, n, axis);
    dst_re[to] = src_re[from];
    dst_im[to] = src_im[from];
}

extern "C" __global__ void butterfly_kernel(float* re, float* im,
                                            unsigned int n, unsigned int axis, unsigned int stage,
                                            float direction, float scale) {
    unsigned int t = blockIdx.x * blockDim.x + threadIdx.x;
    unsigned int half_n = n / 2;
    if (t >= n * n * half_n) return;
    unsigned int line = t / half_n;
    unsigned int k = t % half_n;
    unsigned int half = 1u << stage;
    unsigned int group = half << 1;
    unsigned int j = k % half;
    unsigned int top_pos = (k / half) * group + j;
    unsigned int top = axis_index(line, top_pos, n, axis);
    unsigned int bottom = axis_index(line, top_pos + half, n, axis);
    float angle = -6.2831853f * (float)j / (float)group * direction;
    float wr = cosf(angle);
    float wi = sinf(angle);
    float br = re[bottom] * wr - im[bottom] * wi;
    float bi = re[bottom] * wi + im[bottom] * wr;
    float tr = re[top];
    float ti = im[top];
    re[top] = (tr + br) * scale;
    im[top] = (ti + bi) * scale;
    re[bottom] = (tr - br) * scale;
    im[bottom] = (ti - bi) * scale;
}
"#;

// =====================================================================================
// LAUNCH GEOMETRY & SHARED INDEXING
// =====================================================================================

/// Blocks per lattice dimension for an edge of `size`.
#[inline]
pub fn workgroups_per_dim(size: u32) -> u32 {
    size.div_ceil(WORKGROUP_DIM)
}

/// Blocks needed to cover `threads` one-dimensional invocations.
#[inline]
pub fn linear_blocks(threads: u32) -> u32 {
    threads.div_ceil(TRANSFORM_BLOCK).max(1)
}

/// Flat index of lattice point `(x, y, z)`, x fastest.
#[inline]
pub fn lattice_index(x: usize, y: usize, z: usize, n: usize) -> usize {
    (z * n + y) * n + x
}

/// Flat index of element `i` on transform line `line` along `axis` (0 = x, 1 = y, 2 = z).
#[inline]
pub fn axis_index(line: usize, i: usize, n: usize, axis: usize) -> usize {
    let a = line % n;
    let b = line / n;
    match axis {
        0 => (b * n + a) * n + i,
        1 => (b * n + i) * n + a,
        _ => (i * n + b) * n + a,
    }
}

// =====================================================================================
// HOST CELL KERNELS
// =====================================================================================

/// Evaluates one lattice point on the host; identical math to the CUDA entry points.
#[inline]
pub fn evaluate_cell(params: &NoiseParams, x: u32, y: u32, z: u32) -> f32 {
    let size = params.size.get();
    let seed = params.hash_seed();
    let p = sample_point(x, y, z, size, params.scale);
    match params.kind {
        NoiseKind::Gradient => {
            let n = fractal_noise(p, params.octaves, params.persistence, seed);
            (n * 0.5 + 0.5).clamp(0.0, 1.0)
        }
        NoiseKind::CellularDistance => {
            let (f1, _) = cellular_distances(p, seed);
            f1.clamp(0.0, 1.0)
        }
        NoiseKind::CellularEdge => {
            let (f1, f2) = cellular_distances(p, seed);
            (f2 - f1).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LatticeSize;

    #[test]
    fn workgroup_counts_cover_the_lattice() {
        assert_eq!(workgroups_per_dim(8), 1);
        assert_eq!(workgroups_per_dim(16), 2);
        assert_eq!(workgroups_per_dim(32), 4);
        assert_eq!(workgroups_per_dim(9), 2);
        assert_eq!(linear_blocks(32 * 32 * 16), 64);
        assert_eq!(linear_blocks(0), 1);
    }

    #[test]
    fn axis_index_walks_each_dimension() {
        let n = 8;
        // line 3 along x is row y=3, z=0
        assert_eq!(axis_index(3, 5, n, 0), lattice_index(5, 3, 0, n));
        // line 10 along y is x=2, z=1
        assert_eq!(axis_index(10, 4, n, 1), lattice_index(2, 4, 1, n));
        // line 10 along z is x=2, y=1
        assert_eq!(axis_index(10, 6, n, 2), lattice_index(2, 1, 6, n));
    }

    #[test]
    fn sources_declare_their_entry_points() {
        for kind in KernelKind::ALL {
            let source = kind.source();
            assert!(source.contains(kind.entry_point()), "{kind:?} source lacks its entry point");
            assert!(source.contains("extern \"C\" __global__"));
        }
        assert!(KernelKind::Transform.source().contains(BIT_REVERSE_ENTRY));
    }

    #[test]
    fn noise_sources_share_the_hash_constants() {
        for kind in [KernelKind::GradientNoise, KernelKind::CellularDistance, KernelKind::CellularEdge] {
            let source = kind.source();
            assert!(source.contains("127.1f") && source.contains("43758.545f"));
        }
    }

    #[test]
    fn host_cells_stay_in_unit_range() {
        for kind in [NoiseKind::Gradient, NoiseKind::CellularDistance, NoiseKind::CellularEdge] {
            let params = NoiseParams::new(kind, LatticeSize::S8).with_scale(3.0).with_seed(11);
            for z in 0..8 {
                for y in 0..8 {
                    for x in 0..8 {
                        let v = evaluate_cell(&params, x, y, z);
                        assert!((0.0..=1.0).contains(&v), "{kind} produced {v}");
                    }
                }
            }
        }
    }
}
