/* src/bench.rs */
//! # Benchmark Harness
//!
//! Times each backend directly on the same noise request. The engine's
//! fallback policy is bypassed here: an accelerated backend that is
//! unavailable, or fails during timing, is reported as unavailable rather than
//! silently measured on the sequential path.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::ComputeBackend;
use crate::engine::NoiseEngine;
use crate::error::{LatticeError, Result};
use crate::params::{BackendKind, NoiseParams};

// =====================================================================================
// TIMING STATISTICS
// =====================================================================================

/// Mean and population standard deviation of a timing series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingSummary {
    /// Arithmetic mean in milliseconds
    pub avg_ms: f64,
    /// Population standard deviation in milliseconds
    pub std_dev_ms: f64,
}

/// Summarises per-iteration timings; an empty series summarises to zeros.
pub fn summarize_timings(timings_ms: &[f64]) -> TimingSummary {
    if timings_ms.is_empty() {
        return TimingSummary::default();
    }
    let n = timings_ms.len() as f64;
    let avg_ms = timings_ms.iter().sum::<f64>() / n;
    let variance = timings_ms.iter().map(|t| (t - avg_ms).powi(2)).sum::<f64>() / n;
    TimingSummary { avg_ms, std_dev_ms: variance.sqrt() }
}

/// Calls per second implied by an average call time; zero when the average is zero.
pub fn ops_per_second(avg_ms: f64) -> f64 {
    if avg_ms > 0.0 {
        1000.0 / avg_ms
    } else {
        0.0
    }
}

// =====================================================================================
// BENCHMARK ENTRIES
// =====================================================================================

/// Timing of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkEntry {
    /// Backend measured
    pub method: BackendKind,
    /// False when the backend could not be measured
    pub available: bool,
    /// Mean call time in milliseconds
    pub avg_time_ms: f64,
    /// Population standard deviation in milliseconds
    pub std_dev_ms: f64,
    /// Calls that were timed
    pub iterations: usize,
    /// `1000 / avg_time_ms`
    pub ops_per_second: f64,
}

impl BenchmarkEntry {
    /// Entry for a backend that could not be measured.
    pub fn unavailable(method: BackendKind) -> Self {
        Self { method, available: false, avg_time_ms: 0.0, std_dev_ms: 0.0, iterations: 0, ops_per_second: 0.0 }
    }

    /// Entry built from per-iteration timings.
    pub fn from_timings(method: BackendKind, timings_ms: &[f64]) -> Self {
        let summary = summarize_timings(timings_ms);
        Self {
            method,
            available: true,
            avg_time_ms: summary.avg_ms,
            std_dev_ms: summary.std_dev_ms,
            iterations: timings_ms.len(),
            ops_per_second: ops_per_second(summary.avg_ms),
        }
    }
}

/// Times the accelerated backend (when available) and the fallback on `params`.
///
/// # Arguments
/// * `engine` - Engine whose backends are measured.
/// * `params` - Noise request evaluated on every iteration.
/// * `iterations` - Timed calls per backend; must be at least 1.
///
/// # Returns
/// One entry per backend, accelerated first.
pub fn run_benchmark(engine: &NoiseEngine, params: &NoiseParams, iterations: usize) -> Result<Vec<BenchmarkEntry>> {
    if iterations == 0 {
        return Err(LatticeError::invalid("benchmark iterations must be at least 1"));
    }
    params.validate()?;
    info!(kind = %params.kind, size = %params.size, iterations, "benchmarking backends");

    let accelerated = match engine.capability().ensure_available() {
        Ok(()) => time_backend(engine.accelerated(), params, iterations),
        Err(error) => {
            debug!(backend = %engine.accelerated().kind(), %error, "skipping accelerated timing");
            BenchmarkEntry::unavailable(engine.accelerated().kind())
        }
    };
    let fallback = time_backend(engine.fallback(), params, iterations);
    Ok(vec![accelerated, fallback])
}

fn time_backend(backend: &dyn ComputeBackend, params: &NoiseParams, iterations: usize) -> BenchmarkEntry {
    let mut timings = Vec::with_capacity(iterations);
    for iteration in 0..iterations {
        let started = Instant::now();
        match backend.compute_noise(params) {
            Ok(_) => timings.push(started.elapsed().as_secs_f64() * 1000.0),
            Err(error) => {
                warn!(backend = %backend.kind(), iteration, %error, "benchmark dispatch failed");
                return BenchmarkEntry::unavailable(backend.kind());
            }
        }
    }
    let entry = BenchmarkEntry::from_timings(backend.kind(), &timings);
    debug!(backend = %entry.method, avg_ms = entry.avg_time_ms, std_dev_ms = entry.std_dev_ms, "backend timed");
    entry
}

// =====================================================================================
// REPORT
// =====================================================================================

/// Benchmark entries plus summary, host description and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Request that was timed
    pub params: NoiseParams,
    /// Per-backend results
    pub entries: Vec<BenchmarkEntry>,
    /// Comparison across backends
    pub summary: BenchmarkSummary,
    /// Host description
    pub system_info: SystemInfo,
    /// RFC 3339 creation time
    pub timestamp: String,
}

/// Cross-backend comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    /// Available backend with the lowest mean time
    pub fastest_method: Option<BackendKind>,
    /// Fallback mean time over accelerated mean time, when both were measured
    pub speedup: Option<f64>,
    /// Backend the engine should prefer for this request shape
    pub recommended_method: BackendKind,
    /// Entries that were measured
    pub total_methods_tested: usize,
}

impl BenchmarkSummary {
    /// Derives the summary from entries.
    pub fn from_entries(entries: &[BenchmarkEntry]) -> Self {
        let measured: Vec<&BenchmarkEntry> = entries.iter().filter(|e| e.available).collect();
        let fastest_method = measured
            .iter()
            .min_by(|a, b| a.avg_time_ms.total_cmp(&b.avg_time_ms))
            .map(|e| e.method);

        let mean_of = |kind: BackendKind| measured.iter().find(|e| e.method == kind).map(|e| e.avg_time_ms);
        let speedup = match (mean_of(BackendKind::Gpu), mean_of(BackendKind::CpuFallback)) {
            (Some(gpu), Some(cpu)) if gpu > 0.0 => Some(cpu / gpu),
            _ => None,
        };

        Self {
            fastest_method,
            speedup,
            recommended_method: fastest_method.unwrap_or(BackendKind::CpuFallback),
            total_methods_tested: measured.len(),
        }
    }
}

impl BenchmarkReport {
    /// Builds the report, collecting host information now.
    pub fn new(params: NoiseParams, entries: Vec<BenchmarkEntry>, gpu_info: impl Into<String>) -> Self {
        Self {
            summary: BenchmarkSummary::from_entries(&entries),
            params,
            entries,
            system_info: SystemInfo::collect(gpu_info),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Human-readable rendering.
    pub fn to_text_format(&self) -> String {
        let mut output = String::new();

        output.push_str("=== SPECTRAL LATTICE BENCHMARK REPORT ===\n\n");
        output.push_str(&format!("Timestamp: {}\n", self.timestamp));
        output.push_str(&format!(
            "Request: {} noise, size {}, scale {}, octaves {}, persistence {}, seed {}\n",
            self.params.kind, self.params.size, self.params.scale, self.params.octaves, self.params.persistence, self.params.seed
        ));
        match self.summary.fastest_method {
            Some(method) => output.push_str(&format!("Fastest Method: {method}\n")),
            None => output.push_str("Fastest Method: none measured\n"),
        }
        if let Some(speedup) = self.summary.speedup {
            output.push_str(&format!("GPU Speedup: {speedup:.2}x\n"));
        }
        output.push_str(&format!("Recommended: {}\n", self.summary.recommended_method));
        output.push_str(&format!("Methods Tested: {}\n\n", self.summary.total_methods_tested));

        output.push_str("=== DETAILED RESULTS ===\n");
        for entry in &self.entries {
            output.push_str(&format!("\n{}\n", entry.method));
            if !entry.available {
                output.push_str("  Available: false\n");
                continue;
            }
            output.push_str(&format!("  Avg Time: {:.3} ms\n", entry.avg_time_ms));
            output.push_str(&format!("  Std Dev: {:.3} ms\n", entry.std_dev_ms));
            output.push_str(&format!("  Ops/sec: {:.2}\n", entry.ops_per_second));
            output.push_str(&format!("  Iterations: {}\n", entry.iterations));
        }

        output.push_str("\n=== SYSTEM INFO ===\n");
        output.push_str(&format!("CPU: {}\n", self.system_info.cpu_info));
        output.push_str(&format!("Memory: {:.1} GB\n", self.system_info.total_memory_gb));
        output.push_str(&format!("GPU: {}\n", self.system_info.gpu_info));
        output.push_str(&format!("OS: {}\n", self.system_info.os_info));

        output
    }
}

/// Host description attached to reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// CPU brand and core count
    pub cpu_info: String,
    /// Installed memory in GiB
    pub total_memory_gb: f64,
    /// Accelerated device description
    pub gpu_info: String,
    /// Operating system version
    pub os_info: String,
}

impl SystemInfo {
    /// Collects host information through `sysinfo`.
    pub fn collect(gpu_info: impl Into<String>) -> Self {
        let mut system = sysinfo::System::new_all();
        system.refresh_all();

        let cpu_info = format!(
            "{} ({} cores)",
            system.cpus().first().map(|cpu| cpu.brand()).unwrap_or("Unknown"),
            system.cpus().len()
        );
        let total_memory_gb = system.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let os_info = sysinfo::System::long_os_version().unwrap_or_else(|| "Unknown".to_string());

        Self { cpu_info, total_memory_gb, gpu_info: gpu_info.into(), os_info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::params::{LatticeSize, NoiseKind};

    #[test]
    fn summary_uses_population_deviation() {
        let summary = summarize_timings(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((summary.avg_ms - 5.0).abs() < 1e-12);
        assert!((summary.std_dev_ms - 2.0).abs() < 1e-12);
        assert_eq!(summarize_timings(&[]), TimingSummary::default());
    }

    #[test]
    fn ops_per_second_inverts_mean() {
        assert!((ops_per_second(4.0) - 250.0).abs() < 1e-12);
        assert_eq!(ops_per_second(0.0), 0.0);
        let entry = BenchmarkEntry::from_timings(BackendKind::CpuFallback, &[1.0, 3.0]);
        assert_eq!(entry.iterations, 2);
        assert!((entry.ops_per_second - 500.0).abs() < 1e-9);
    }

    #[test]
    fn cpu_only_engine_reports_gpu_unavailable() {
        let engine = NoiseEngine::new(EngineConfig::cpu_only()).unwrap();
        let params = NoiseParams::new(NoiseKind::CellularEdge, LatticeSize::S8);
        let entries = run_benchmark(&engine, &params, 3).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].method, BackendKind::Gpu);
        assert!(!entries[0].available);
        assert_eq!(entries[0].avg_time_ms, 0.0);
        assert!(entries[1].available);
        assert_eq!(entries[1].iterations, 3);
        assert!(entries[1].avg_time_ms >= 0.0);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let engine = NoiseEngine::new(EngineConfig::cpu_only()).unwrap();
        let params = NoiseParams::new(NoiseKind::Gradient, LatticeSize::S8);
        assert!(engine.run_benchmark(&params, 0).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn summary_recommends_the_fastest_measured_backend() {
        let entries = vec![
            BenchmarkEntry::from_timings(BackendKind::Gpu, &[0.5, 0.5]),
            BenchmarkEntry::from_timings(BackendKind::CpuFallback, &[2.0, 2.0]),
        ];
        let summary = BenchmarkSummary::from_entries(&entries);
        assert_eq!(summary.fastest_method, Some(BackendKind::Gpu));
        assert_eq!(summary.recommended_method, BackendKind::Gpu);
        assert!((summary.speedup.unwrap() - 4.0).abs() < 1e-9);

        let without_gpu = vec![BenchmarkEntry::unavailable(BackendKind::Gpu), entries[1].clone()];
        let summary = BenchmarkSummary::from_entries(&without_gpu);
        assert_eq!(summary.recommended_method, BackendKind::CpuFallback);
        assert!(summary.speedup.is_none());
        assert_eq!(summary.total_methods_tested, 1);
    }

    #[test]
    fn text_report_lists_every_entry() {
        let params = NoiseParams::new(NoiseKind::Gradient, LatticeSize::S8);
        let entries = vec![
            BenchmarkEntry::unavailable(BackendKind::Gpu),
            BenchmarkEntry::from_timings(BackendKind::CpuFallback, &[1.0]),
        ];
        let report = BenchmarkReport::new(params, entries, "none");
        let text = report.to_text_format();
        assert!(text.contains("gpu\n  Available: false"));
        assert!(text.contains("cpu-fallback"));
        assert!(text.contains("Recommended: cpu-fallback"));
    }
}
