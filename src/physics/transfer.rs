/* src/physics/transfer.rs */
//! # Energy Transfer
//!
//! Moves energy from one spectral object to another under a ratio cap, a
//! transfer efficiency and an optional capacity limit on the receiver.
//! [`transfer_energy`] only computes the new energy levels;
//! [`apply_energy_transfer`] also produces the rescaled objects.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::energy::calculate_channel_energy;
use super::spectral::{ChannelId, SpectralObject};
use crate::error::{LatticeError, Result};

/// Relative tolerance when deciding "depleted" and "at capacity".
const LEVEL_TOLERANCE: f64 = 1e-12;

/// Transfer policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferOptions {
    /// Largest fraction of the source energy one transfer may draw
    pub max_transfer_ratio: f64,
    /// Fraction of the drawn energy that reaches the target, in [0, 1]
    pub efficiency: f64,
    /// Let the target exceed its capacity
    pub allow_overflow: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self { max_transfer_ratio: 1.0, efficiency: 1.0, allow_overflow: false }
    }
}

impl TransferOptions {
    /// Sets the efficiency.
    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    /// Sets the ratio cap.
    pub fn with_max_transfer_ratio(mut self, ratio: f64) -> Self {
        self.max_transfer_ratio = ratio;
        self
    }

    /// Sets the overflow policy.
    pub fn with_overflow(mut self, allow_overflow: bool) -> Self {
        self.allow_overflow = allow_overflow;
        self
    }

    /// Efficiency in [0, 1]; ratio finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if !self.efficiency.is_finite() || !(0.0..=1.0).contains(&self.efficiency) {
            return Err(LatticeError::invalid(format!("efficiency must lie in [0, 1], got {}", self.efficiency)));
        }
        if !self.max_transfer_ratio.is_finite() || self.max_transfer_ratio < 0.0 {
            return Err(LatticeError::invalid(format!(
                "max transfer ratio must be finite and >= 0, got {}",
                self.max_transfer_ratio
            )));
        }
        Ok(())
    }
}

/// New energy levels after a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyTransferResult {
    /// Energy drawn from the source
    pub transferred_amount: f64,
    /// Energy that reached the target, `transferred · efficiency` unless clipped
    pub received_amount: f64,
    /// Source energy afterwards
    pub source_remaining_energy: f64,
    /// Target energy afterwards
    pub target_new_energy: f64,
    /// Source has no energy left
    pub source_depleted: bool,
    /// Target has no headroom left
    pub target_at_capacity: bool,
}

/// Computes a transfer of up to `amount` from `source` to `target`.
///
/// The drawn amount is `min(amount, source·max_transfer_ratio, source)` and
/// the target receives `drawn · efficiency`. Without overflow, receipt is
/// clipped to the target's headroom and the drawn amount is re-derived as
/// `received / efficiency` (0 at zero efficiency). A non-positive amount or
/// an empty source produces a no-op result. Neither input is modified.
pub fn transfer_energy(
    source: &SpectralObject,
    target: &SpectralObject,
    amount: f64,
    options: &TransferOptions,
) -> Result<EnergyTransferResult> {
    options.validate()?;
    if amount.is_nan() {
        return Err(LatticeError::invalid("transfer amount must not be NaN"));
    }

    let source_energy = source.energy();
    let target_energy = target.energy();
    let capacity = target.capacity();

    if amount <= 0.0 || source_energy <= 0.0 {
        return Ok(EnergyTransferResult {
            transferred_amount: 0.0,
            received_amount: 0.0,
            source_remaining_energy: source_energy,
            target_new_energy: target_energy,
            source_depleted: source_energy <= 0.0,
            target_at_capacity: at_capacity(target_energy, capacity),
        });
    }

    let mut drawn = amount.min(source_energy * options.max_transfer_ratio).min(source_energy);
    let mut received = drawn * options.efficiency;

    if !options.allow_overflow {
        let headroom = (capacity - target_energy).max(0.0);
        if received > headroom {
            received = headroom;
            drawn = if options.efficiency > 0.0 { received / options.efficiency } else { 0.0 };
        }
    }

    let source_remaining_energy = (source_energy - drawn).max(0.0);
    let target_new_energy = target_energy + received;
    debug!(drawn, received, source_remaining_energy, target_new_energy, "energy transfer computed");

    Ok(EnergyTransferResult {
        transferred_amount: drawn,
        received_amount: received,
        source_remaining_energy,
        target_new_energy,
        source_depleted: source_remaining_energy <= LEVEL_TOLERANCE * source_energy,
        target_at_capacity: at_capacity(target_new_energy, capacity),
    })
}

fn at_capacity(energy: f64, capacity: f64) -> bool {
    capacity <= 0.0 || energy >= capacity * (1.0 - LEVEL_TOLERANCE)
}

/// Objects produced by [`apply_energy_transfer`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    /// Source after the transfer
    pub source: SpectralObject,
    /// Target after the transfer
    pub target: SpectralObject,
    /// Energy levels
    pub result: EnergyTransferResult,
}

/// Performs [`transfer_energy`] and rebuilds both objects.
///
/// The source shrinks uniformly by `sqrt(remaining / energy)`, keeping its
/// spectral shape. The received energy is split across channels in
/// proportion to the source's channel energies: an existing target channel
/// is rescaled by `sqrt((old + added) / old)`, a missing (or silent) one is
/// created from the source channel scaled by `sqrt(added / source_channel)`.
pub fn apply_energy_transfer(
    source: &SpectralObject,
    target: &SpectralObject,
    amount: f64,
    options: &TransferOptions,
) -> Result<TransferOutcome> {
    let result = transfer_energy(source, target, amount, options)?;

    let new_source = if result.transferred_amount > 0.0 {
        let factor = (result.source_remaining_energy / source.energy()).sqrt();
        source.with_channels(source.channels().scaled(factor))?
    } else {
        source.clone()
    };

    let new_target = if result.received_amount > 0.0 {
        let source_energy = source.energy();
        let mut channels = target.channels().clone();
        for id in ChannelId::ALL {
            let Some(donor) = source.channels().get(id) else { continue };
            let donor_energy = calculate_channel_energy(Some(donor));
            if donor_energy <= 0.0 {
                continue;
            }
            let added = result.received_amount * donor_energy / source_energy;
            let existing = channels.get(id);
            let existing_energy = calculate_channel_energy(existing);
            let merged = match existing {
                Some(channel) if existing_energy > 0.0 => {
                    channel.scaled(((existing_energy + added) / existing_energy).sqrt())
                }
                _ => donor.scaled((added / donor_energy).sqrt()),
            };
            channels = channels.with(id, Some(merged));
        }
        target.with_channels(channels)?
    } else {
        target.clone()
    };

    Ok(TransferOutcome { source: new_source, target: new_target, result })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::physics::spectral::{ChannelSet, PhysicsParams, SpectralChannel, SpectralCoefficient};

    /// Red-only object whose energy is exactly `energy`.
    fn body(energy: f64, capacity: f64) -> SpectralObject {
        let channels = ChannelSet::default().with(ChannelId::Red, Some(SpectralChannel::dc(energy.sqrt())));
        SpectralObject::new(channels, capacity, PhysicsParams::default()).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn lossy_transfer_within_capacity() {
        let options = TransferOptions::default().with_efficiency(0.8);
        let result = transfer_energy(&body(100.0, 200.0), &body(50.0, 120.0), 40.0, &options).unwrap();
        assert!(close(result.transferred_amount, 40.0));
        assert!(close(result.received_amount, 32.0));
        assert!(close(result.source_remaining_energy, 60.0));
        assert!(close(result.target_new_energy, 82.0));
        assert!(!result.target_at_capacity);
        assert!(!result.source_depleted);
    }

    #[test]
    fn receipt_is_clipped_to_headroom() {
        let options = TransferOptions::default().with_efficiency(0.8);
        let result = transfer_energy(&body(100.0, 200.0), &body(50.0, 70.0), 40.0, &options).unwrap();
        assert!(close(result.received_amount, 20.0));
        assert!(close(result.transferred_amount, 25.0));
        assert!(close(result.source_remaining_energy, 75.0));
        assert!(close(result.target_new_energy, 70.0));
        assert!(result.target_at_capacity);
    }

    #[test]
    fn degenerate_transfers_are_no_ops() {
        let options = TransferOptions::default();
        for amount in [0.0, -5.0] {
            let result = transfer_energy(&body(10.0, 20.0), &body(1.0, 20.0), amount, &options).unwrap();
            assert_eq!(result.transferred_amount, 0.0);
            assert!(close(result.source_remaining_energy, 10.0));
        }
        let empty = transfer_energy(&body(0.0, 20.0), &body(1.0, 20.0), 5.0, &options).unwrap();
        assert!(empty.source_depleted);
        assert_eq!(empty.received_amount, 0.0);
    }

    #[test]
    fn zero_capacity_target_is_always_full() {
        let result = transfer_energy(&body(10.0, 20.0), &body(0.0, 0.0), 5.0, &TransferOptions::default()).unwrap();
        assert!(result.target_at_capacity);
        assert_eq!(result.received_amount, 0.0);
        assert_eq!(result.transferred_amount, 0.0);
    }

    #[test]
    fn ratio_cap_and_source_limit_apply() {
        let capped = TransferOptions::default().with_max_transfer_ratio(0.25).with_overflow(true);
        let result = transfer_energy(&body(100.0, 200.0), &body(0.0, 1.0), 90.0, &capped).unwrap();
        assert!(close(result.transferred_amount, 25.0));

        let greedy = TransferOptions::default().with_max_transfer_ratio(3.0).with_overflow(true);
        let result = transfer_energy(&body(10.0, 20.0), &body(0.0, 1.0), 50.0, &greedy).unwrap();
        assert!(close(result.transferred_amount, 10.0));
        assert!(result.source_depleted);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let source = body(10.0, 20.0);
        let target = body(1.0, 20.0);
        for options in [
            TransferOptions::default().with_efficiency(1.5),
            TransferOptions::default().with_efficiency(f64::NAN),
            TransferOptions::default().with_max_transfer_ratio(-1.0),
        ] {
            assert!(transfer_energy(&source, &target, 1.0, &options).unwrap_err().is_invalid_parameter());
        }
        assert!(transfer_energy(&source, &target, f64::NAN, &TransferOptions::default()).is_err());
    }

    #[test]
    fn applied_transfer_rescales_both_objects() {
        let source_channels = ChannelSet::default()
            .with(ChannelId::Red, Some(SpectralChannel::new(3.0, 0.1, vec![SpectralCoefficient::new(1.0, 0.7)])))
            .with(ChannelId::Blue, Some(SpectralChannel::dc(2.0)));
        let source = SpectralObject::new(source_channels, 100.0, PhysicsParams::default()).unwrap();
        let target = body(4.0, 100.0);

        let outcome = apply_energy_transfer(&source, &target, 7.5, &TransferOptions::default()).unwrap();
        assert!(close(outcome.source.energy(), outcome.result.source_remaining_energy));
        assert!(close(outcome.target.energy(), outcome.result.target_new_energy));

        let red = outcome.source.channels().red.as_ref().unwrap();
        assert_eq!(red.coefficients[0].phase, 0.7);
        assert!(close(red.coefficients[0].amplitude / red.dc_amplitude, 1.0 / 3.0));

        let created_blue = outcome.target.channels().blue.as_ref().unwrap();
        assert!(close(calculate_channel_energy(Some(created_blue)), 7.5 * 4.0 / 14.0));
    }

    #[test]
    fn applied_no_op_returns_copies() {
        let source = body(10.0, 20.0);
        let target = body(3.0, 20.0);
        let outcome = apply_energy_transfer(&source, &target, 0.0, &TransferOptions::default()).unwrap();
        assert_eq!(outcome.source, source);
        assert_eq!(outcome.target, target);
    }

    proptest! {
        #[test]
        fn lossless_overflowing_transfer_conserves_energy(
            source_energy in 0.0f64..1_000.0,
            target_energy in 0.0f64..1_000.0,
            amount in 0.0f64..2_000.0,
        ) {
            let options = TransferOptions::default().with_overflow(true);
            let source = body(source_energy, 2_000.0);
            let target = body(target_energy, 10.0);
            let result = transfer_energy(&source, &target, amount, &options).unwrap();
            let tolerance = 1e-9 * (source.energy() + target.energy()).max(1.0);
            prop_assert!((result.source_remaining_energy + result.transferred_amount - source.energy()).abs() <= tolerance);
            prop_assert!((result.target_new_energy - target.energy() - result.transferred_amount).abs() <= tolerance);
        }

        #[test]
        fn applied_energies_match_computed_levels(
            source_energy in 0.5f64..500.0,
            target_energy in 0.0f64..500.0,
            amount in 0.0f64..600.0,
            efficiency in 0.0f64..=1.0,
            capacity in 0.0f64..1_000.0,
        ) {
            let options = TransferOptions::default().with_efficiency(efficiency);
            let source = body(source_energy, 1_000.0);
            let target = body(target_energy, capacity);
            let outcome = apply_energy_transfer(&source, &target, amount, &options).unwrap();
            let tolerance = 1e-8 * (source_energy + target_energy).max(1.0);
            prop_assert!((outcome.source.energy() - outcome.result.source_remaining_energy).abs() <= tolerance);
            prop_assert!((outcome.target.energy() - outcome.result.target_new_energy).abs() <= tolerance);
        }
    }
}
