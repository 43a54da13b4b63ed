/* src/physics/mod.rs */
#![warn(missing_docs)]
//! # Energy Physics
//!
//! Frequency-domain energy of spectral objects. Energy is the Parseval sum of
//! squared amplitudes (`dc² + Σ aₖ²`) over the present channels.
//!
//! - [`spectral`]: coefficient, channel and object types
//! - [`energy`]: accounting, coherence loss, fracture checks
//! - [`transfer`]: inter-object energy transfer
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

pub mod energy;
pub mod spectral;
pub mod transfer;

pub use energy::{
    apply_coherence_loss, calculate_channel_energy, calculate_coefficient_energy, calculate_total_energy,
    channel_energies, check_fracture, is_near_fracture, normalized_energy, predict_energy, remaining_capacity,
    time_to_energy, ChannelEnergies, FractureCheckResult, DEFAULT_WARNING_RATIO,
};
pub use spectral::{ChannelId, ChannelSet, PhysicsParams, SpectralChannel, SpectralCoefficient, SpectralObject};
pub use transfer::{apply_energy_transfer, transfer_energy, EnergyTransferResult, TransferOptions, TransferOutcome};
