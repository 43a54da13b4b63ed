/* src/physics/energy.rs */
//! # Energy Accounting
//!
//! Parseval energy of spectral objects, exponential coherence loss and
//! fracture detection. All functions take objects by reference and return new
//! values.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::spectral::{ChannelSet, SpectralChannel, SpectralCoefficient, SpectralObject};
use crate::error::{LatticeError, Result};

/// Default fraction of the fracture threshold at which an object is "near" fracture.
pub const DEFAULT_WARNING_RATIO: f64 = 0.8;

/// `amplitude²`.
#[inline]
pub fn calculate_coefficient_energy(coefficient: &SpectralCoefficient) -> f64 {
    coefficient.amplitude * coefficient.amplitude
}

/// `dc² + Σ amplitude²`, or 0 for an absent channel.
pub fn calculate_channel_energy(channel: Option<&SpectralChannel>) -> f64 {
    channel.map_or(0.0, |c| {
        c.dc_amplitude * c.dc_amplitude + c.coefficients.iter().map(calculate_coefficient_energy).sum::<f64>()
    })
}

/// Sum of channel energies, derived from the coefficients rather than the cache.
pub fn calculate_total_energy(object: &SpectralObject) -> f64 {
    channels_energy(object.channels())
}

fn channels_energy(channels: &ChannelSet) -> f64 {
    channels.iter().map(|(_, c)| calculate_channel_energy(Some(c))).sum()
}

/// Channel-set energy that must be finite; anything else means corrupted coefficients.
pub(crate) fn checked_channels_energy(channels: &ChannelSet) -> Result<f64> {
    let energy = channels_energy(channels);
    if !energy.is_finite() || energy < 0.0 {
        return Err(LatticeError::physics(format!("spectral energy must be finite and >= 0, got {energy}")));
    }
    Ok(energy)
}

/// Energy per channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ChannelEnergies {
    /// Red channel energy
    pub red: f64,
    /// Green channel energy
    pub green: f64,
    /// Blue channel energy
    pub blue: f64,
    /// Alpha channel energy
    pub alpha: f64,
}

impl ChannelEnergies {
    /// Sum over all channels.
    pub fn total(&self) -> f64 {
        self.red + self.green + self.blue + self.alpha
    }
}

/// Energy breakdown of an object by channel.
pub fn channel_energies(object: &SpectralObject) -> ChannelEnergies {
    let channels = object.channels();
    ChannelEnergies {
        red: calculate_channel_energy(channels.red.as_ref()),
        green: calculate_channel_energy(channels.green.as_ref()),
        blue: calculate_channel_energy(channels.blue.as_ref()),
        alpha: calculate_channel_energy(channels.alpha.as_ref()),
    }
}

/// Decays every amplitude by `exp(-λ·Δt)`, keeping phases.
///
/// A non-positive rate or elapsed time returns an unchanged copy. A NaN
/// elapsed time is rejected.
pub fn apply_coherence_loss(object: &SpectralObject, delta_time: f64) -> Result<SpectralObject> {
    if delta_time.is_nan() {
        return Err(LatticeError::invalid("elapsed time must not be NaN"));
    }
    let rate = object.physics().coherence_loss_rate;
    if rate <= 0.0 || delta_time <= 0.0 {
        return Ok(object.clone());
    }
    let factor = (-rate * delta_time).exp();
    trace!(rate, delta_time, factor, "applying coherence loss");
    object.with_channels(object.channels().scaled(factor))
}

/// Energy after `delta_time` of coherence loss, without building the object.
pub fn predict_energy(object: &SpectralObject, delta_time: f64) -> f64 {
    let rate = object.physics().coherence_loss_rate;
    if rate <= 0.0 || delta_time <= 0.0 {
        return object.energy();
    }
    object.energy() * (-2.0 * rate * delta_time).exp()
}

/// Time until coherence loss brings energy down to `target`.
///
/// `None` when the object does not decay or `target` is not in `(0, energy]`.
pub fn time_to_energy(object: &SpectralObject, target: f64) -> Option<f64> {
    let rate = object.physics().coherence_loss_rate;
    let energy = object.energy();
    if rate <= 0.0 || !(target > 0.0 && target <= energy) {
        return None;
    }
    Some((energy / target).ln() / (2.0 * rate))
}

/// Outcome of a fracture check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FractureCheckResult {
    /// Energy reached the threshold
    pub fractured: bool,
    /// Energy at the time of the check
    pub current_energy: f64,
    /// Fracture threshold
    pub threshold: f64,
    /// `max(0, current - threshold)`
    pub excess_energy: f64,
    /// `current / threshold`, 0 when the object cannot fracture
    pub stress_level: f64,
}

/// Compares the object's energy against its fracture threshold.
pub fn check_fracture(object: &SpectralObject) -> FractureCheckResult {
    let current_energy = object.energy();
    let threshold = object.physics().fracture_threshold;
    if threshold <= 0.0 {
        return FractureCheckResult { fractured: false, current_energy, threshold, excess_energy: 0.0, stress_level: 0.0 };
    }
    FractureCheckResult {
        fractured: current_energy >= threshold,
        current_energy,
        threshold,
        excess_energy: (current_energy - threshold).max(0.0),
        stress_level: current_energy / threshold,
    }
}

/// True when `threshold·warning_ratio <= energy < threshold`.
pub fn is_near_fracture(object: &SpectralObject, warning_ratio: f64) -> bool {
    let threshold = object.physics().fracture_threshold;
    if threshold <= 0.0 {
        return false;
    }
    let energy = object.energy();
    threshold * warning_ratio <= energy && energy < threshold
}

/// `energy / capacity`; 1 for an object without capacity.
pub fn normalized_energy(object: &SpectralObject) -> f64 {
    if object.capacity() <= 0.0 {
        return 1.0;
    }
    object.energy() / object.capacity()
}

/// `max(0, capacity - energy)`.
pub fn remaining_capacity(object: &SpectralObject) -> f64 {
    (object.capacity() - object.energy()).max(0.0)
}
