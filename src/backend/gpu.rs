/* src/backend/gpu.rs */
//! # CUDA Backend
//!
//! Data-parallel noise and transform dispatch through the CUDA driver API.
//! Kernel sources are compiled with NVRTC on first use and cached per
//! [`KernelKind`]. Every device interaction runs on a dedicated worker thread
//! and is awaited with a bounded timeout, so a wedged driver surfaces as a
//! [`DispatchError::Timeout`] instead of a hang.
//!
//! Without the `cuda` feature this module compiles to a backend that always
//! reports itself unavailable.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

pub use device::GpuBackend;

/// True when the crate was built with CUDA support.
pub const fn compiled_with_cuda() -> bool {
    cfg!(feature = "cuda")
}

#[cfg(feature = "cuda")]
mod device {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use cudarc::driver::{
        CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, LaunchConfig, PushKernelArg,
    };
    use cudarc::nvrtc::compile_ptx;
    use dashmap::DashMap;
    use once_cell::sync::OnceCell;
    use tracing::{debug, info, trace, warn};

    use crate::backend::{Capability, ComputeBackend, SpectralPair};
    use crate::config::EngineConfig;
    use crate::error::DispatchError;
    use crate::kernels::{
        linear_blocks, workgroups_per_dim, KernelKind, BIT_REVERSE_ENTRY, BUTTERFLY_ENTRY,
        WORKGROUP_DIM, TRANSFORM_BLOCK,
    };
    use crate::metrics::{counter, gauge, histogram};
    use crate::params::{BackendKind, NoiseParams};
    use crate::transform::{TransformDirection, TransformRequest};

    /// An opened device: context, the stream every dispatch is queued on, and its name.
    struct Device {
        ctx: Arc<CudaContext>,
        stream: Arc<CudaStream>,
        name: String,
    }

    /// State shared between the backend handle and its dispatch workers.
    struct Shared {
        ordinal: usize,
        probe_timeout: Duration,
        device: OnceCell<Result<Arc<Device>, String>>,
        modules: DashMap<KernelKind, Arc<CudaModule>>,
    }

    impl Shared {
        /// Opens the device on first call; later calls return the memoized outcome.
        fn device(&self) -> Result<Arc<Device>, DispatchError> {
            self.device
                .get_or_init(|| open_device(self.ordinal, self.probe_timeout))
                .clone()
                .map_err(DispatchError::Unavailable)
        }

        /// Compiled module for `kind`, built at most once.
        fn module(&self, device: &Device, kind: KernelKind) -> Result<Arc<CudaModule>, DispatchError> {
            if let Some(module) = self.modules.get(&kind) {
                return Ok(Arc::clone(&module));
            }

            let started = Instant::now();
            let ptx = compile_ptx(kind.source()).map_err(|e| DispatchError::PipelineCreation {
                kernel: kind.entry_point(),
                message: format!("{e:?}"),
            })?;
            let module = device.ctx.load_module(ptx).map_err(|e| DispatchError::PipelineCreation {
                kernel: kind.entry_point(),
                message: format!("{e:?}"),
            })?;

            counter!("lattice.gpu.pipelines_built").increment(1);
            debug!(kernel = %kind, elapsed_ms = started.elapsed().as_secs_f64() * 1000.0, "kernel module compiled");
            let module = Arc::clone(&self.modules.entry(kind).or_insert(module));
            gauge!("lattice.gpu.cached_modules").set(self.modules.len() as f64);
            Ok(module)
        }
    }

    fn open_device(ordinal: usize, timeout: Duration) -> Result<Arc<Device>, String> {
        let started = Instant::now();
        let (tx, rx) = flume::bounded(1);
        thread::Builder::new()
            .name("lattice-gpu-probe".to_string())
            .spawn(move || {
                // The dynamically loaded driver panics when libcuda is missing.
                let outcome = panic::catch_unwind(|| -> Result<Device, String> {
                    let ctx = CudaContext::new(ordinal).map_err(|e| format!("{e:?}"))?;
                    let stream = ctx.default_stream();
                    let name = ctx.name().unwrap_or_else(|_| format!("CUDA device {ordinal}"));
                    Ok(Device { ctx, stream, name })
                })
                .unwrap_or_else(|_| Err("CUDA driver library could not be loaded".to_string()));
                let _ = tx.send(outcome);
            })
            .map_err(|e| format!("failed to spawn probe thread: {e}"))?;

        let outcome = match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(flume::RecvTimeoutError::Timeout) => Err(format!("capability probe timed out after {timeout:?}")),
            Err(flume::RecvTimeoutError::Disconnected) => Err("capability probe exited without an answer".to_string()),
        };
        histogram!("lattice.gpu.probe_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(device) => {
                info!(ordinal, device = %device.name, "CUDA device opened");
                Ok(Arc::new(device))
            }
            Err(reason) => {
                warn!(ordinal, %reason, "CUDA device unavailable");
                Err(reason)
            }
        }
    }

    /// Owns one device allocation for the duration of a dispatch. Dropping the
    /// guard frees the allocation on every exit path.
    struct DeviceBuffer {
        slice: CudaSlice<f32>,
        role: &'static str,
    }

    impl DeviceBuffer {
        fn zeroed(stream: &CudaStream, len: usize, role: &'static str) -> Result<Self, DispatchError> {
            let slice = stream.alloc_zeros::<f32>(len).map_err(|e| DispatchError::BufferAllocation {
                role,
                message: format!("{e:?}"),
            })?;
            Ok(Self::track(slice, role))
        }

        fn upload(stream: &CudaStream, host: &[f32], role: &'static str) -> Result<Self, DispatchError> {
            let slice = stream.memcpy_stod(host).map_err(|e| DispatchError::BufferAllocation {
                role,
                message: format!("{e:?}"),
            })?;
            Ok(Self::track(slice, role))
        }

        fn track(slice: CudaSlice<f32>, role: &'static str) -> Self {
            counter!("lattice.gpu.buffers_allocated").increment(1);
            trace!(role, len = slice.len(), "device buffer allocated");
            Self { slice, role }
        }

        /// Copies the buffer into a host staging vector once the stream drains.
        fn read(&self, stream: &CudaStream) -> Result<Vec<f32>, DispatchError> {
            stream.synchronize().map_err(|e| DispatchError::Readback(format!("{e:?}")))?;
            stream.memcpy_dtov(&self.slice).map_err(|e| DispatchError::Readback(format!("{e:?}")))
        }
    }

    impl Drop for DeviceBuffer {
        fn drop(&mut self) {
            counter!("lattice.gpu.buffers_released").increment(1);
            trace!(role = self.role, len = self.slice.len(), "device buffer released");
        }
    }

    fn load_function(module: &CudaModule, entry: &'static str) -> Result<CudaFunction, DispatchError> {
        module.load_function(entry).map_err(|e| DispatchError::PipelineCreation {
            kernel: entry,
            message: format!("{e:?}"),
        })
    }

    fn launch_error(kernel: &'static str) -> impl Fn(cudarc::driver::DriverError) -> DispatchError {
        move |e| DispatchError::Launch { kernel, message: format!("{e:?}") }
    }

    fn noise_on_device(shared: &Shared, device: &Device, params: &NoiseParams) -> Result<Vec<f32>, DispatchError> {
        let kind = KernelKind::for_noise(params.kind);
        let module = shared.module(device, kind)?;
        let function = load_function(&module, kind.entry_point())?;
        let stream = &device.stream;

        let size = params.size.get();
        let mut output = DeviceBuffer::zeroed(stream, params.size.total_elements(), "storage")?;
        let uniforms = DeviceBuffer::upload(stream, &params.uniforms(), "uniform")?;

        let groups = workgroups_per_dim(size);
        let cfg = LaunchConfig {
            grid_dim: (groups, groups, groups),
            block_dim: (WORKGROUP_DIM, WORKGROUP_DIM, WORKGROUP_DIM),
            shared_mem_bytes: 0,
        };
        unsafe {
            stream
                .launch_builder(&function)
                .arg(&mut output.slice)
                .arg(&uniforms.slice)
                .arg(&size)
                .launch(cfg)
        }
        .map_err(launch_error(kind.entry_point()))?;

        output.read(stream)
    }

    fn transform_on_device(shared: &Shared, device: &Device, request: &TransformRequest) -> Result<SpectralPair, DispatchError> {
        let module = shared.module(device, KernelKind::Transform)?;
        let bit_reverse = load_function(&module, BIT_REVERSE_ENTRY)?;
        let butterfly = load_function(&module, BUTTERFLY_ENTRY)?;
        let stream = &device.stream;

        let n = request.size.get();
        let log2n = request.size.log2();
        let total = request.size.total_elements() as u32;
        let direction = request.direction.sign();

        let mut re = DeviceBuffer::upload(stream, &request.real_part, "storage")?;
        let mut im = DeviceBuffer::upload(stream, &request.imag_part, "storage")?;
        let mut scratch_re = DeviceBuffer::zeroed(stream, total as usize, "scratch")?;
        let mut scratch_im = DeviceBuffer::zeroed(stream, total as usize, "scratch")?;

        let permute_cfg = LaunchConfig {
            grid_dim: (linear_blocks(total), 1, 1),
            block_dim: (TRANSFORM_BLOCK, 1, 1),
            shared_mem_bytes: 0,
        };
        let stage_cfg = LaunchConfig {
            grid_dim: (linear_blocks(total / 2), 1, 1),
            block_dim: (TRANSFORM_BLOCK, 1, 1),
            shared_mem_bytes: 0,
        };

        for axis in 0..3u32 {
            unsafe {
                stream
                    .launch_builder(&bit_reverse)
                    .arg(&re.slice)
                    .arg(&im.slice)
                    .arg(&mut scratch_re.slice)
                    .arg(&mut scratch_im.slice)
                    .arg(&n)
                    .arg(&log2n)
                    .arg(&axis)
                    .launch(permute_cfg)
            }
            .map_err(launch_error(BIT_REVERSE_ENTRY))?;
            std::mem::swap(&mut re, &mut scratch_re);
            std::mem::swap(&mut im, &mut scratch_im);

            for stage in 0..log2n {
                let scale = if request.direction == TransformDirection::Inverse && stage + 1 == log2n {
                    1.0 / n as f32
                } else {
                    1.0_f32
                };
                unsafe {
                    stream
                        .launch_builder(&butterfly)
                        .arg(&mut re.slice)
                        .arg(&mut im.slice)
                        .arg(&n)
                        .arg(&axis)
                        .arg(&stage)
                        .arg(&direction)
                        .arg(&scale)
                        .launch(stage_cfg)
                }
                .map_err(launch_error(BUTTERFLY_ENTRY))?;
                // Stage s+1 reads pairs written by stage s.
                stream.synchronize().map_err(launch_error(BUTTERFLY_ENTRY))?;
            }
        }

        Ok((re.read(stream)?, im.read(stream)?))
    }

    /// CUDA noise/transform backend.
    pub struct GpuBackend {
        shared: Arc<Shared>,
        dispatch_timeout: Duration,
    }

    impl std::fmt::Debug for GpuBackend {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("GpuBackend")
                .field("ordinal", &self.shared.ordinal)
                .field("cached_modules", &self.shared.modules.len())
                .field("dispatch_timeout", &self.dispatch_timeout)
                .finish()
        }
    }

    impl GpuBackend {
        /// Creates the backend. No driver call happens until the first probe.
        pub fn new(config: &EngineConfig) -> Self {
            Self {
                shared: Arc::new(Shared {
                    ordinal: config.device_ordinal,
                    probe_timeout: config.probe_timeout(),
                    device: OnceCell::new(),
                    modules: DashMap::new(),
                }),
                dispatch_timeout: config.readback_timeout(),
            }
        }

        /// Number of compiled kernel modules held by this backend.
        pub fn cached_modules(&self) -> usize {
            self.shared.modules.len()
        }

        /// Runs `job` on a worker thread and waits at most the dispatch timeout.
        fn dispatch<T, F>(&self, job: F) -> Result<T, DispatchError>
        where
            T: Send + 'static,
            F: FnOnce(&Shared, &Device) -> Result<T, DispatchError> + Send + 'static,
        {
            let device = self.shared.device()?;
            let shared = Arc::clone(&self.shared);
            let (tx, rx) = flume::bounded(1);
            thread::Builder::new()
                .name("lattice-gpu-dispatch".to_string())
                .spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&shared, &device)))
                        .unwrap_or_else(|_| Err(DispatchError::DeviceLost("dispatch worker panicked".to_string())));
                    let _ = tx.send(outcome);
                })
                .map_err(|e| DispatchError::DeviceLost(format!("failed to spawn dispatch worker: {e}")))?;

            match rx.recv_timeout(self.dispatch_timeout) {
                Ok(outcome) => outcome,
                Err(flume::RecvTimeoutError::Timeout) => Err(DispatchError::Timeout(self.dispatch_timeout)),
                Err(flume::RecvTimeoutError::Disconnected) => {
                    Err(DispatchError::DeviceLost("dispatch worker exited without a result".to_string()))
                }
            }
        }
    }

    impl ComputeBackend for GpuBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Gpu
        }

        fn detect_capability(&self) -> Capability {
            match self.shared.device() {
                Ok(device) => Capability::available(device.name.clone()),
                Err(DispatchError::Unavailable(reason)) => Capability::unavailable(reason),
                Err(other) => Capability::unavailable(other.to_string()),
            }
        }

        fn compute_noise(&self, params: &NoiseParams) -> Result<Vec<f32>, DispatchError> {
            let params = params.clone();
            self.dispatch(move |shared, device| noise_on_device(shared, device, &params))
        }

        fn compute_transform(&self, request: &TransformRequest) -> Result<SpectralPair, DispatchError> {
            let request = request.clone();
            self.dispatch(move |shared, device| transform_on_device(shared, device, &request))
        }
    }
}

#[cfg(not(feature = "cuda"))]
mod device {
    use crate::backend::{Capability, ComputeBackend, SpectralPair};
    use crate::config::EngineConfig;
    use crate::error::DispatchError;
    use crate::params::{BackendKind, NoiseParams};
    use crate::transform::TransformRequest;

    const REASON: &str = "built without the `cuda` feature";

    /// Placeholder for the CUDA backend; never available.
    #[derive(Debug)]
    pub struct GpuBackend {
        ordinal: usize,
    }

    impl GpuBackend {
        /// Creates the backend.
        pub fn new(config: &EngineConfig) -> Self {
            Self { ordinal: config.device_ordinal }
        }

        /// Always zero.
        pub fn cached_modules(&self) -> usize {
            0
        }
    }

    impl ComputeBackend for GpuBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Gpu
        }

        fn detect_capability(&self) -> Capability {
            Capability::unavailable(format!("{REASON} (device {})", self.ordinal))
        }

        fn compute_noise(&self, _params: &NoiseParams) -> Result<Vec<f32>, DispatchError> {
            Err(DispatchError::Unavailable(REASON.to_string()))
        }

        fn compute_transform(&self, _request: &TransformRequest) -> Result<SpectralPair, DispatchError> {
            Err(DispatchError::Unavailable(REASON.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ComputeBackend;
    use crate::config::EngineConfig;
    use crate::params::{BackendKind, LatticeSize, NoiseKind, NoiseParams};

    #[test]
    fn probe_is_stable_across_calls() {
        let backend = GpuBackend::new(&EngineConfig::default());
        let first = backend.detect_capability();
        let second = backend.detect_capability();
        assert_eq!(first, second);
        assert_eq!(backend.kind(), BackendKind::Gpu);
        if !first.available {
            assert!(first.reason.is_some());
        }
    }

    #[test]
    fn unavailable_device_refuses_dispatch() {
        let backend = GpuBackend::new(&EngineConfig::default());
        if backend.detect_capability().available {
            return;
        }
        let params = NoiseParams::new(NoiseKind::Gradient, LatticeSize::S8);
        assert!(backend.compute_noise(&params).is_err());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn stub_names_the_missing_feature() {
        assert!(!compiled_with_cuda());
        let capability = GpuBackend::new(&EngineConfig::default()).detect_capability();
        assert!(!capability.available);
        assert!(capability.reason.unwrap_or_default().contains("cuda"));
    }
}
