/* src/main.rs */
#![warn(missing_docs)]
//! # Spectral Lattice CLI
//!
//! Command-line front end for the spectral lattice engine: noise generation,
//! radix-2 transforms, backend benchmarks, device diagnostics and spectral
//! energy reports.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs as async_fs;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spectral_lattice::{
    backend::gpu::compiled_with_cuda,
    bench::BenchmarkReport,
    physics::{
        apply_coherence_loss, channel_energies, check_fracture, is_near_fracture, normalized_energy,
        remaining_capacity, time_to_energy, transfer_energy, ChannelEnergies, EnergyTransferResult,
        FractureCheckResult, SpectralObject, TransferOptions,
    },
    BackendKind, BackendPreference, Capability, EngineConfig, LatticeSize, NoiseEngine, NoiseKind, NoiseParams, NoiseResult,
    SystemInfo, TransformDirection, TransformRequest, TransformResult,
};

// =====================================================================================
// CLI CONFIGURATION & ARGUMENTS
// =====================================================================================

/// Spectral Lattice CLI - volumetric noise and spectral energy engine
#[derive(Parser, Debug)]
#[command(
    name = "spectral-lattice",
    version = env!("CARGO_PKG_VERSION"),
    author = "Lord Xyn <lord.xyn@arcmoon.studios>",
    about = "Volumetric procedural noise on CUDA with sequential fallback, plus spectral energy physics"
)]
struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "json", global = true)]
    output_format: OutputFormat,

    /// Never probe the GPU
    #[arg(long, global = true)]
    cpu_only: bool,
}

/// Noise request arguments shared by `noise` and `benchmark`.
#[derive(clap::Args, Debug, Clone)]
struct NoiseArgs {
    /// Noise family
    #[arg(short, long, default_value = "gradient")]
    kind: KindArg,

    /// Lattice edge length (8, 16 or 32)
    #[arg(short, long, default_value = "16")]
    size: u32,

    /// Sample-space extent covered by the lattice
    #[arg(long, default_value = "4.0")]
    scale: f32,

    /// Fractal octaves for gradient noise
    #[arg(long, default_value = "4")]
    octaves: u32,

    /// Amplitude falloff per octave
    #[arg(long, default_value = "0.5")]
    persistence: f32,

    /// Hash seed
    #[arg(long, default_value = "0")]
    seed: u32,
}

impl NoiseArgs {
    fn to_params(&self) -> Result<NoiseParams> {
        let params = NoiseParams::new(self.kind.into(), LatticeSize::new(self.size)?)
            .with_scale(self.scale)
            .with_octaves(self.octaves)
            .with_persistence(self.persistence)
            .with_seed(self.seed);
        params.validate()?;
        Ok(params)
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a noise lattice
    Noise {
        #[command(flatten)]
        noise: NoiseArgs,

        /// Output file path (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run the 3D radix-2 transform
    Transform {
        /// Request file (JSON or YAML); a seeded random signal is used when absent
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Lattice edge length for the random signal
        #[arg(short, long, default_value = "8")]
        size: u32,

        /// Seed for the random signal
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Run the inverse transform
        #[arg(long)]
        inverse: bool,

        /// Emit `[re0, im0, re1, im1, ...]` instead of separate parts
        #[arg(long)]
        interleaved: bool,

        /// Output file path (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Time every backend on one noise request
    Benchmark {
        #[command(flatten)]
        noise: NoiseArgs,

        /// Timed calls per backend (configuration default if not specified)
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Report file path (stdout if not specified)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Probe the device and smoke-test every kernel
    Diagnostic {
        /// Report file path (stdout if not specified)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Report energy, fracture and decay for a spectral object
    Energy {
        /// Spectral object file (JSON or YAML)
        #[arg(short, long)]
        input: PathBuf,

        /// Elapsed time for the coherence-loss projection
        #[arg(long, default_value = "0.0")]
        elapsed: f64,

        /// Fraction of the fracture threshold that counts as "near"
        #[arg(long, default_value = "0.8")]
        warning_ratio: f64,

        /// Transfer target object file
        #[arg(long)]
        target: Option<PathBuf>,

        /// Energy to transfer to the target
        #[arg(long, default_value = "0.0")]
        amount: f64,

        /// Transfer efficiency
        #[arg(long, default_value = "1.0")]
        efficiency: f64,

        /// Largest fraction of the source energy one transfer may draw
        #[arg(long, default_value = "1.0")]
        max_ratio: f64,

        /// Let the target exceed its capacity
        #[arg(long)]
        allow_overflow: bool,
    },
}

/// Noise family argument
#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Gradient,
    CellularDistance,
    CellularEdge,
}

impl From<KindArg> for NoiseKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Gradient => NoiseKind::Gradient,
            KindArg::CellularDistance => NoiseKind::CellularDistance,
            KindArg::CellularEdge => NoiseKind::CellularEdge,
        }
    }
}

/// Log level configuration
#[derive(ValueEnum, Clone, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Output format options
#[derive(ValueEnum, Clone, Debug, PartialEq)]
enum OutputFormat {
    Json,
    Yaml,
    Binary,
    Text,
}

// =====================================================================================
// APPLICATION CONFIGURATION
// =====================================================================================

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct AppConfig {
    /// Engine configuration
    pub engine: EngineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    pub file_logging: bool,
    pub log_directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: false,
            log_directory: PathBuf::from("logs"),
            file_prefix: "spectral-lattice.log".to_string(),
        }
    }
}

// =====================================================================================
// OUTPUT HELPERS
// =====================================================================================

/// Serializes `value` in the requested format; `text` renders the text form.
fn encode_output<T: Serialize>(value: &T, format: &OutputFormat, text: impl FnOnce() -> String) -> Result<Vec<u8>> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?.into_bytes(),
        OutputFormat::Yaml => serde_yaml::to_string(value)?.into_bytes(),
        OutputFormat::Binary => bincode::serialize(value)?,
        OutputFormat::Text => text().into_bytes(),
    })
}

fn write_output(data: &[u8], path: Option<&Path>, what: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, data).with_context(|| format!("Failed to write {what} to {}", path.display()))?;
            info!("{} written to: {}", what, path.display());
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(data)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Reads a JSON or YAML document, chosen by file extension.
async fn load_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = async_fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML: {}", path.display())),
        _ => serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {}", path.display())),
    }
}

fn field_stats(data: &[f32]) -> (f32, f32, f32) {
    let min = data.iter().copied().fold(f32::INFINITY, f32::min);
    let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = if data.is_empty() { 0.0 } else { data.iter().sum::<f32>() / data.len() as f32 };
    (min, max, mean)
}

// =====================================================================================
// NOISE COMMAND IMPLEMENTATION
// =====================================================================================

/// Execute noise command
async fn cmd_noise(
    engine: Arc<NoiseEngine>,
    noise: NoiseArgs,
    output: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let params = noise.to_params()?;
    info!("Generating {} noise, size {}", params.kind, params.size);

    let result: NoiseResult = tokio::task::spawn_blocking(move || engine.compute_noise(&params)).await??;
    info!("Computed {} values on {} in {:.3} ms", result.total_size, result.method, result.compute_time_ms);

    let data = encode_output(&result, &output_format, || {
        let (min, max, mean) = field_stats(&result.data);
        format!(
            "=== NOISE FIELD ===\nSize: {0}x{0}x{0}\nValues: {1}\nMethod: {2}\nTime: {3:.3} ms\nMin: {4:.4}\nMax: {5:.4}\nMean: {6:.4}",
            result.size, result.total_size, result.method, result.compute_time_ms, min, max, mean
        )
    })?;
    write_output(&data, output.as_deref(), "Noise field")
}

// =====================================================================================
// TRANSFORM COMMAND IMPLEMENTATION
// =====================================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InterleavedTransform {
    data: Vec<f32>,
    method: BackendKind,
    compute_time_ms: f64,
}

fn random_signal(size: LatticeSize, seed: u64, direction: TransformDirection) -> TransformRequest {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = size.total_elements();
    let real: Vec<f32> = (0..n).map(|_| rng.random_range(-1.0f32..1.0)).collect();
    TransformRequest { real_part: real, imag_part: vec![0.0; n], size, direction }
}

/// Execute transform command
#[allow(clippy::too_many_arguments)]
async fn cmd_transform(
    engine: Arc<NoiseEngine>,
    input: Option<PathBuf>,
    size: u32,
    seed: u64,
    inverse: bool,
    interleaved: bool,
    output: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let direction = if inverse { TransformDirection::Inverse } else { TransformDirection::Forward };
    let request = match input {
        Some(path) => {
            let mut request: TransformRequest = load_structured(&path).await?;
            if inverse {
                request.direction = TransformDirection::Inverse;
            }
            request
        }
        None => random_signal(LatticeSize::new(size)?, seed, direction),
    };
    info!("Running {:?} transform over {} values", request.direction, request.size.total_elements());

    let result: TransformResult = tokio::task::spawn_blocking(move || engine.compute_transform(&request)).await??;
    info!("Transform ran on {} in {:.3} ms", result.method, result.compute_time_ms);

    let text = || {
        format!(
            "=== TRANSFORM ===\nValues: {}\nMethod: {}\nTime: {:.3} ms\nSpectral Energy: {:.6}\nDC: ({:.6}, {:.6})",
            result.real_part.len(),
            result.method,
            result.compute_time_ms,
            result.energy(),
            result.real_part.first().copied().unwrap_or_default(),
            result.imag_part.first().copied().unwrap_or_default(),
        )
    };
    let data = if interleaved {
        let packed = InterleavedTransform {
            data: result.interleaved(),
            method: result.method,
            compute_time_ms: result.compute_time_ms,
        };
        encode_output(&packed, &output_format, text)?
    } else {
        encode_output(&result, &output_format, text)?
    };
    write_output(&data, output.as_deref(), "Transform result")
}

// =====================================================================================
// BENCHMARK COMMAND IMPLEMENTATION
// =====================================================================================

/// Execute benchmark command
async fn cmd_benchmark(
    engine: Arc<NoiseEngine>,
    noise: NoiseArgs,
    iterations: Option<usize>,
    report: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let params = noise.to_params()?;
    let iterations = iterations.unwrap_or(engine.config().benchmark_iterations);
    info!("Starting backend benchmarks");
    info!("Kind: {}, Size: {}, Iterations: {}", params.kind, params.size, iterations);

    let final_report = tokio::task::spawn_blocking(move || -> spectral_lattice::Result<BenchmarkReport> {
        let entries = engine.run_benchmark(&params, iterations)?;
        let gpu_info = describe_capability(engine.capability());
        Ok(BenchmarkReport::new(params, entries, gpu_info))
    })
    .await??;

    let output_data = encode_output(&final_report, &output_format, || final_report.to_text_format())?;
    write_output(&output_data, report.as_deref(), "Benchmark report")?;

    info!("Benchmarking completed successfully");
    Ok(())
}

fn describe_capability(capability: &Capability) -> String {
    match (&capability.device_name, &capability.reason) {
        (Some(name), _) if capability.available => name.clone(),
        (_, Some(reason)) => format!("unavailable ({reason})"),
        _ => "unavailable".to_string(),
    }
}

// =====================================================================================
// DIAGNOSTIC COMMAND IMPLEMENTATION
// =====================================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
struct DiagnosticResult {
    component: String,
    status: String, // "PASS", "WARN", "FAIL"
    issues: Vec<String>,
    performance_metrics: HashMap<String, f64>,
    recommendations: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiagnosticReport {
    overall_status: String,
    version: String,
    component_results: Vec<DiagnosticResult>,
    system_info: SystemInfo,
    timestamp: String,
    recommendations: Vec<String>,
}

impl DiagnosticReport {
    fn new(component_results: Vec<DiagnosticResult>, gpu_info: String) -> Self {
        let overall_status = if component_results.iter().any(|r| r.status == "FAIL") {
            "FAIL"
        } else if component_results.iter().any(|r| r.status == "WARN") {
            "WARN"
        } else {
            "PASS"
        };

        let mut recommendations: Vec<String> = component_results
            .iter()
            .flat_map(|r| r.recommendations.iter().cloned())
            .collect();
        if recommendations.is_empty() {
            recommendations.push("System is operating optimally".to_string());
        }

        Self {
            overall_status: overall_status.to_string(),
            version: spectral_lattice::version().to_string(),
            component_results,
            system_info: SystemInfo::collect(gpu_info),
            timestamp: chrono::Utc::now().to_rfc3339(),
            recommendations,
        }
    }

    fn to_text_format(&self) -> String {
        let mut output = String::new();
        output.push_str("=== SPECTRAL LATTICE DIAGNOSTICS ===\n\n");
        output.push_str(&format!("Version: {}\n", self.version));
        output.push_str(&format!("Timestamp: {}\n", self.timestamp));
        output.push_str(&format!("Overall: {}\n", self.overall_status));
        for result in &self.component_results {
            output.push_str(&format!("\n{} [{}]\n", result.component, result.status));
            for issue in &result.issues {
                output.push_str(&format!("  issue: {issue}\n"));
            }
            let mut metrics: Vec<_> = result.performance_metrics.iter().collect();
            metrics.sort_by(|a, b| a.0.cmp(b.0));
            for (name, value) in metrics {
                output.push_str(&format!("  {name}: {value:.3}\n"));
            }
        }
        output.push_str("\n=== RECOMMENDATIONS ===\n");
        for recommendation in &self.recommendations {
            output.push_str(&format!("- {recommendation}\n"));
        }
        output
    }
}

fn run_device_diagnostics(engine: &NoiseEngine) -> DiagnosticResult {
    let mut issues = Vec::new();
    let mut metrics = HashMap::new();
    let mut recommendations = Vec::new();

    let started = Instant::now();
    let capability = engine.capability().clone();
    metrics.insert("probe_ms".to_string(), started.elapsed().as_secs_f64() * 1000.0);
    metrics.insert("cuda_feature_enabled".to_string(), if compiled_with_cuda() { 1.0 } else { 0.0 });

    if !compiled_with_cuda() {
        issues.push("CUDA feature not enabled".to_string());
        recommendations.push("Rebuild with --features cuda".to_string());
    } else if !capability.available {
        issues.push(capability.reason.clone().unwrap_or_else(|| "no device".to_string()));
        recommendations.push("Check the CUDA driver installation and device ordinal".to_string());
    }

    DiagnosticResult {
        component: "GPU".to_string(),
        status: if capability.available { "PASS" } else { "WARN" }.to_string(),
        issues,
        performance_metrics: metrics,
        recommendations,
    }
}

fn run_kernel_diagnostics(engine: &NoiseEngine) -> DiagnosticResult {
    let mut issues = Vec::new();
    let mut metrics = HashMap::new();

    for kind in [NoiseKind::Gradient, NoiseKind::CellularDistance, NoiseKind::CellularEdge] {
        let params = NoiseParams::new(kind, LatticeSize::S8);
        match engine.compute_noise(&params) {
            Ok(result) => {
                metrics.insert(format!("{kind}_ms"), result.compute_time_ms);
                if result.data.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    issues.push(format!("{kind} produced values outside [0, 1]"));
                }
                if result.method == BackendKind::CpuFallback && engine.capability().available {
                    issues.push(format!("{kind} fell back to the sequential backend"));
                }
            }
            Err(e) => issues.push(format!("{kind} failed: {e}")),
        }
    }

    let mut impulse = vec![0.0; LatticeSize::S8.total_elements()];
    impulse[0] = 1.0;
    let request = TransformRequest::forward(impulse, vec![0.0; LatticeSize::S8.total_elements()], LatticeSize::S8);
    match engine.compute_transform(&request) {
        Ok(result) => {
            metrics.insert("transform_ms".to_string(), result.compute_time_ms);
            if result.real_part.iter().any(|v| (v - 1.0).abs() > 1e-4) {
                issues.push("impulse transform is not flat".to_string());
            }
        }
        Err(e) => issues.push(format!("transform failed: {e}")),
    }

    DiagnosticResult {
        component: "Kernels".to_string(),
        status: if issues.is_empty() { "PASS" } else { "FAIL" }.to_string(),
        issues,
        performance_metrics: metrics,
        recommendations: Vec::new(),
    }
}

/// Execute diagnostic command
async fn cmd_diagnostic(engine: Arc<NoiseEngine>, report: Option<PathBuf>, output_format: OutputFormat) -> Result<()> {
    info!("Running system diagnostics");

    let final_report = tokio::task::spawn_blocking(move || {
        let device = run_device_diagnostics(&engine);
        let kernels = run_kernel_diagnostics(&engine);
        let gpu_info = describe_capability(engine.capability());
        DiagnosticReport::new(vec![device, kernels], gpu_info)
    })
    .await?;

    if final_report.overall_status == "FAIL" {
        warn!("Diagnostics found failures");
    }
    let output_data = encode_output(&final_report, &output_format, || final_report.to_text_format())?;
    write_output(&output_data, report.as_deref(), "Diagnostic report")?;

    info!("Diagnostics completed");
    Ok(())
}

// =====================================================================================
// ENERGY COMMAND IMPLEMENTATION
// =====================================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecayProjection {
    elapsed: f64,
    energy: f64,
    fracture: FractureCheckResult,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnergyReport {
    energy: f64,
    capacity: f64,
    channels: ChannelEnergies,
    normalized_energy: f64,
    remaining_capacity: f64,
    fracture: FractureCheckResult,
    near_fracture: bool,
    half_life: Option<f64>,
    decay: Option<DecayProjection>,
    transfer: Option<EnergyTransferResult>,
}

impl EnergyReport {
    fn to_text_format(&self) -> String {
        let mut output = String::new();
        output.push_str("=== SPECTRAL ENERGY REPORT ===\n\n");
        output.push_str(&format!("Energy: {:.6} / {:.6} ({:.1}%)\n", self.energy, self.capacity, self.normalized_energy * 100.0));
        output.push_str(&format!("Remaining Capacity: {:.6}\n", self.remaining_capacity));
        output.push_str(&format!(
            "Channels: R {:.6}  G {:.6}  B {:.6}  A {:.6}\n",
            self.channels.red, self.channels.green, self.channels.blue, self.channels.alpha
        ));
        output.push_str(&format!(
            "Fracture: {} (stress {:.3}, excess {:.6}){}\n",
            self.fracture.fractured,
            self.fracture.stress_level,
            self.fracture.excess_energy,
            if self.near_fracture { " NEAR" } else { "" }
        ));
        if let Some(half_life) = self.half_life {
            output.push_str(&format!("Half-life: {half_life:.6}\n"));
        }
        if let Some(decay) = &self.decay {
            output.push_str(&format!("After {:.3}: energy {:.6}, fractured {}\n", decay.elapsed, decay.energy, decay.fracture.fractured));
        }
        if let Some(transfer) = &self.transfer {
            output.push_str(&format!(
                "Transfer: drew {:.6}, delivered {:.6}, source {:.6}, target {:.6}{}\n",
                transfer.transferred_amount,
                transfer.received_amount,
                transfer.source_remaining_energy,
                transfer.target_new_energy,
                if transfer.target_at_capacity { " (target full)" } else { "" }
            ));
        }
        output
    }
}

/// Execute energy command
#[allow(clippy::too_many_arguments)]
async fn cmd_energy(
    input: PathBuf,
    elapsed: f64,
    warning_ratio: f64,
    target: Option<PathBuf>,
    options: TransferOptions,
    amount: f64,
    output_format: OutputFormat,
) -> Result<()> {
    let object: SpectralObject = load_structured(&input).await?;
    info!("Loaded spectral object with energy {:.6}", object.energy());

    let decay = if elapsed > 0.0 {
        let decayed = apply_coherence_loss(&object, elapsed)?;
        Some(DecayProjection { elapsed, energy: decayed.energy(), fracture: check_fracture(&decayed) })
    } else {
        None
    };

    let transfer = match target {
        Some(path) => {
            let target: SpectralObject = load_structured(&path).await?;
            Some(transfer_energy(&object, &target, amount, &options)?)
        }
        None => None,
    };

    let report = EnergyReport {
        energy: object.energy(),
        capacity: object.capacity(),
        channels: channel_energies(&object),
        normalized_energy: normalized_energy(&object),
        remaining_capacity: remaining_capacity(&object),
        fracture: check_fracture(&object),
        near_fracture: is_near_fracture(&object, warning_ratio),
        half_life: time_to_energy(&object, object.energy() / 2.0),
        decay,
        transfer,
    };

    let output_data = encode_output(&report, &output_format, || report.to_text_format())?;
    write_output(&output_data, None, "Energy report")
}

// =====================================================================================
// MAIN APPLICATION ENTRY POINT
// =====================================================================================

/// Setup logging configuration
fn setup_logging(args: &Args, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level = Level::from(args.log_level.clone());

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let (file_layer, guard) = if logging.file_logging {
        fs::create_dir_all(&logging.log_directory)
            .with_context(|| format!("Failed to create log directory: {}", logging.log_directory.display()))?;
        let appender = tracing_appender::rolling::daily(&logging.log_directory, &logging.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_writer(writer).with_ansi(false).json()), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Load application configuration
async fn load_config(config_path: Option<&Path>) -> Result<AppConfig> {
    match config_path {
        Some(path) => load_structured(path).await,
        None => Ok(AppConfig::default()),
    }
}

// =====================================================================================
// MAIN FUNCTION
// =====================================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = load_config(args.config.as_deref()).await?;
    if args.cpu_only {
        config.engine.backend = BackendPreference::CpuOnly;
    }

    // Setup logging; the guard flushes the file writer on exit
    let _guard = setup_logging(&args, &config.logging)?;

    let engine = Arc::new(NoiseEngine::new(config.engine.clone()).context("Invalid engine configuration")?);

    // Dispatch subcommands
    match args.command {
        Commands::Noise { noise, output } => {
            cmd_noise(engine, noise, output, args.output_format).await?;
        }
        Commands::Transform { input, size, seed, inverse, interleaved, output } => {
            cmd_transform(engine, input, size, seed, inverse, interleaved, output, args.output_format).await?;
        }
        Commands::Benchmark { noise, iterations, report } => {
            cmd_benchmark(engine, noise, iterations, report, args.output_format).await?;
        }
        Commands::Diagnostic { report } => {
            cmd_diagnostic(engine, report, args.output_format).await?;
        }
        Commands::Energy { input, elapsed, warning_ratio, target, amount, efficiency, max_ratio, allow_overflow } => {
            if !(0.0..=1.0).contains(&warning_ratio) {
                bail!("warning ratio must lie in [0, 1], got {warning_ratio}");
            }
            let options = TransferOptions::default()
                .with_efficiency(efficiency)
                .with_max_transfer_ratio(max_ratio)
                .with_overflow(allow_overflow);
            cmd_energy(input, elapsed, warning_ratio, target, options, amount, args.output_format).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yaml_config_is_selected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lattice.yaml");
        fs::write(&path, "engine:\n  backend: cpu-only\n  benchmark_iterations: 3\nlogging:\n  file_logging: false\n").unwrap();
        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.engine.backend, BackendPreference::CpuOnly);
        assert_eq!(config.engine.benchmark_iterations, 3);
        assert_eq!(config.engine.probe_timeout_ms, 3_000);
    }

    #[tokio::test]
    async fn json_config_fills_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lattice.json");
        fs::write(&path, r#"{ "engine": { "device_ordinal": 1 } }"#).unwrap();
        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.engine.device_ordinal, 1);
        assert!(!config.logging.file_logging);
    }

    #[tokio::test]
    async fn missing_config_is_an_error_with_context() {
        let err = load_config(Some(Path::new("/definitely/not/here.json"))).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn random_signal_is_seeded() {
        let a = random_signal(LatticeSize::S8, 7, TransformDirection::Forward);
        let b = random_signal(LatticeSize::S8, 7, TransformDirection::Forward);
        assert_eq!(a.real_part, b.real_part);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn text_output_uses_renderer() {
        let data = encode_output(&1_u32, &OutputFormat::Text, || "rendered".to_string()).unwrap();
        assert_eq!(data, b"rendered");
        let json = encode_output(&1_u32, &OutputFormat::Json, String::new).unwrap();
        assert_eq!(json, b"1");
    }
}
