/* src/error.rs */
//! # Error Taxonomy
//!
//! Library-wide error types. `LatticeError` is what callers see; `DispatchError`
//! describes device-side failures and is absorbed by the engine's fallback path
//! before it can reach a caller of `compute_noise`.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the spectral lattice engine.
///
/// Only malformed input (`InvalidParameter`) and upstream contract breaches
/// (`PhysicsInvariant`) are expected to surface from noise or physics calls;
/// the remaining variants belong to configuration and I/O plumbing.
#[derive(Error, Debug)]
pub enum LatticeError {
    /// A request carried a value outside its documented domain.
    #[error("Invalid Parameter: {message}")]
    InvalidParameter {
        /// Description of the rejected value
        message: String,
    },

    /// A device dispatch failed and no fallback was possible.
    #[error("Dispatch Failure: {0}")]
    Dispatch(#[from] DispatchError),

    /// No parallel backend could be found. Produced by
    /// [`Capability::ensure_available`](crate::backend::Capability::ensure_available);
    /// noise and transform calls recover from it by falling back.
    #[error("Capability Unavailable: {reason}")]
    CapabilityUnavailable {
        /// Why the probe reported the backend as unusable
        reason: String,
    },

    /// Energy derived from coefficients was negative or not finite.
    #[error("Physics Invariant Violation: {message}")]
    PhysicsInvariant {
        /// Which quantity broke the invariant and its value
        message: String,
    },

    /// An error related to engine configuration.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// An error related to system I/O.
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

impl LatticeError {
    /// Builds an `InvalidParameter` error.
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        LatticeError::InvalidParameter { message: message.into() }
    }

    /// Builds a `PhysicsInvariant` error.
    #[inline]
    pub fn physics(message: impl Into<String>) -> Self {
        LatticeError::PhysicsInvariant { message: message.into() }
    }

    /// True for errors caused by caller input rather than the runtime.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, LatticeError::InvalidParameter { .. })
    }
}

/// A specialized `Result` type for spectral lattice operations.
pub type Result<T> = std::result::Result<T, LatticeError>;

/// Failure of a single device dispatch.
///
/// Every variant is recoverable by recomputing on the sequential backend; none
/// of them disables the device for later calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The backend has no usable device.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// Kernel compilation or module loading failed.
    #[error("pipeline creation failed for `{kernel}`: {message}")]
    PipelineCreation {
        /// Kernel entry point
        kernel: &'static str,
        /// Driver or compiler message
        message: String,
    },

    /// A device buffer could not be allocated or populated.
    #[error("buffer allocation failed for {role} buffer: {message}")]
    BufferAllocation {
        /// Storage, uniform or staging
        role: &'static str,
        /// Driver message
        message: String,
    },

    /// The kernel launch was rejected.
    #[error("kernel launch failed for `{kernel}`: {message}")]
    Launch {
        /// Kernel entry point
        kernel: &'static str,
        /// Driver message
        message: String,
    },

    /// Copying results back to the host failed.
    #[error("readback failed: {0}")]
    Readback(String),

    /// The device did not answer within the configured bound.
    #[error("device operation timed out after {0:?}")]
    Timeout(Duration),

    /// The device or its worker went away mid-operation.
    #[error("device lost: {0}")]
    DeviceLost(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_convert_into_lattice_errors() {
        let err: LatticeError = DispatchError::Timeout(Duration::from_millis(250)).into();
        assert!(matches!(err, LatticeError::Dispatch(DispatchError::Timeout(_))));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn invalid_parameter_is_flagged() {
        let err = LatticeError::invalid("size 12 is not supported");
        assert!(err.is_invalid_parameter());
        assert_eq!(err.to_string(), "Invalid Parameter: size 12 is not supported");
        assert!(!LatticeError::physics("energy NaN").is_invalid_parameter());
    }
}
