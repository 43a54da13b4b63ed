/* src/physics/spectral.rs */
//! # Spectral Objects
//!
//! Truncated Fourier spectra per colour channel and the objects that carry
//! them. Every constructor validates its input and caches the object's energy;
//! physics operations return new objects instead of patching existing ones.
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use serde::{Deserialize, Serialize};

use super::energy::checked_channels_energy;
use crate::error::{LatticeError, Result};

/// One harmonic term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralCoefficient {
    /// Magnitude of the term
    pub amplitude: f64,
    /// Phase in radians
    pub phase: f64,
}

impl SpectralCoefficient {
    /// Builds a coefficient.
    pub const fn new(amplitude: f64, phase: f64) -> Self {
        Self { amplitude, phase }
    }
}

/// DC term plus ordered harmonics for one colour or alpha component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpectralChannel {
    /// Amplitude of the zero-frequency term
    pub dc_amplitude: f64,
    /// Phase of the zero-frequency term
    #[serde(default)]
    pub dc_phase: f64,
    /// Harmonics, lowest frequency first
    #[serde(default)]
    pub coefficients: Vec<SpectralCoefficient>,
}

impl SpectralChannel {
    /// Builds a channel.
    pub fn new(dc_amplitude: f64, dc_phase: f64, coefficients: Vec<SpectralCoefficient>) -> Self {
        Self { dc_amplitude, dc_phase, coefficients }
    }

    /// Channel with only a DC term.
    pub fn dc(dc_amplitude: f64) -> Self {
        Self::new(dc_amplitude, 0.0, Vec::new())
    }

    /// Builds a channel from transform output: bin 0 becomes the DC term and
    /// the next `harmonics` bins become `(|c|, arg c)` pairs.
    pub fn from_spectrum(real: &[f32], imag: &[f32], harmonics: usize) -> Result<Self> {
        if real.len() != imag.len() {
            return Err(LatticeError::invalid(format!(
                "real and imaginary arrays must have the same length ({} vs {})",
                real.len(),
                imag.len()
            )));
        }
        if real.is_empty() {
            return Err(LatticeError::invalid("spectrum must contain at least the DC bin"));
        }
        let polar = |i: usize| {
            let (re, im) = (f64::from(real[i]), f64::from(imag[i]));
            (re.hypot(im), im.atan2(re))
        };
        let (dc_amplitude, dc_phase) = polar(0);
        let coefficients = (1..real.len().min(harmonics.saturating_add(1)))
            .map(|i| {
                let (amplitude, phase) = polar(i);
                SpectralCoefficient { amplitude, phase }
            })
            .collect();
        Ok(Self { dc_amplitude, dc_phase, coefficients })
    }

    /// Every amplitude multiplied by `factor`; phases unchanged.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            dc_amplitude: self.dc_amplitude * factor,
            dc_phase: self.dc_phase,
            coefficients: self
                .coefficients
                .iter()
                .map(|c| SpectralCoefficient { amplitude: c.amplitude * factor, phase: c.phase })
                .collect(),
        }
    }
}

/// Channel identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    /// Red component
    Red,
    /// Green component
    Green,
    /// Blue component
    Blue,
    /// Alpha component
    Alpha,
}

impl ChannelId {
    /// All channels in storage order.
    pub const ALL: [ChannelId; 4] = [ChannelId::Red, ChannelId::Green, ChannelId::Blue, ChannelId::Alpha];
}

/// Up to four independent channels; an absent channel carries no energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChannelSet {
    /// Red channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red: Option<SpectralChannel>,
    /// Green channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green: Option<SpectralChannel>,
    /// Blue channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue: Option<SpectralChannel>,
    /// Alpha channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<SpectralChannel>,
}

impl ChannelSet {
    /// Channel by identity.
    pub fn get(&self, id: ChannelId) -> Option<&SpectralChannel> {
        match id {
            ChannelId::Red => self.red.as_ref(),
            ChannelId::Green => self.green.as_ref(),
            ChannelId::Blue => self.blue.as_ref(),
            ChannelId::Alpha => self.alpha.as_ref(),
        }
    }

    /// Copy with channel `id` replaced.
    pub fn with(mut self, id: ChannelId, channel: Option<SpectralChannel>) -> Self {
        match id {
            ChannelId::Red => self.red = channel,
            ChannelId::Green => self.green = channel,
            ChannelId::Blue => self.blue = channel,
            ChannelId::Alpha => self.alpha = channel,
        }
        self
    }

    /// Present channels in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &SpectralChannel)> {
        ChannelId::ALL.into_iter().filter_map(move |id| self.get(id).map(|c| (id, c)))
    }

    /// Every present channel scaled by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            red: self.red.as_ref().map(|c| c.scaled(factor)),
            green: self.green.as_ref().map(|c| c.scaled(factor)),
            blue: self.blue.as_ref().map(|c| c.scaled(factor)),
            alpha: self.alpha.as_ref().map(|c| c.scaled(factor)),
        }
    }
}

/// Decay and fracture behaviour of an object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsParams {
    /// Exponential amplitude decay rate per unit time
    #[serde(default)]
    pub coherence_loss_rate: f64,
    /// Energy at or above which the object fractures; zero disables fracture
    #[serde(default)]
    pub fracture_threshold: f64,
}

impl PhysicsParams {
    /// Builds physics parameters.
    pub const fn new(coherence_loss_rate: f64, fracture_threshold: f64) -> Self {
        Self { coherence_loss_rate, fracture_threshold }
    }

    /// Both values must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if !self.coherence_loss_rate.is_finite() || self.coherence_loss_rate < 0.0 {
            return Err(LatticeError::invalid(format!(
                "coherence loss rate must be finite and >= 0, got {}",
                self.coherence_loss_rate
            )));
        }
        if !self.fracture_threshold.is_finite() || self.fracture_threshold < 0.0 {
            return Err(LatticeError::invalid(format!(
                "fracture threshold must be finite and >= 0, got {}",
                self.fracture_threshold
            )));
        }
        Ok(())
    }
}

/// A spectral object with cached energy.
///
/// The cached energy always equals the Parseval sum over the present
/// channels; the only way to change channels is [`SpectralObject::with_channels`],
/// which recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpectralObjectRecord", into = "SpectralObjectRecord")]
pub struct SpectralObject {
    channels: ChannelSet,
    energy: f64,
    capacity: f64,
    physics: PhysicsParams,
}

impl SpectralObject {
    /// Builds an object and computes its energy.
    ///
    /// # Errors
    /// `InvalidParameter` for a negative or non-finite capacity or physics
    /// value; `PhysicsInvariant` when the coefficients yield a non-finite energy.
    pub fn new(channels: ChannelSet, capacity: f64, physics: PhysicsParams) -> Result<Self> {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(LatticeError::invalid(format!("energy capacity must be finite and >= 0, got {capacity}")));
        }
        physics.validate()?;
        let energy = checked_channels_energy(&channels)?;
        Ok(Self { channels, energy, capacity, physics })
    }

    /// Present channels.
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Cached total energy.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Energy capacity.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Decay and fracture parameters.
    pub fn physics(&self) -> PhysicsParams {
        self.physics
    }

    /// Same object with new channels and recomputed energy.
    pub fn with_channels(&self, channels: ChannelSet) -> Result<Self> {
        let energy = checked_channels_energy(&channels)?;
        Ok(Self { channels, energy, capacity: self.capacity, physics: self.physics })
    }

    /// Same object with new physics parameters.
    pub fn with_physics(&self, physics: PhysicsParams) -> Result<Self> {
        physics.validate()?;
        Ok(Self { physics, ..self.clone() })
    }
}

/// Wire form of [`SpectralObject`]; `energy` is written out but recomputed on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpectralObjectRecord {
    #[serde(default)]
    channels: ChannelSet,
    #[serde(default, skip_deserializing)]
    energy: f64,
    capacity: f64,
    #[serde(default)]
    physics: PhysicsParams,
}

impl TryFrom<SpectralObjectRecord> for SpectralObject {
    type Error = LatticeError;

    fn try_from(record: SpectralObjectRecord) -> Result<Self> {
        SpectralObject::new(record.channels, record.capacity, record.physics)
    }
}

impl From<SpectralObject> for SpectralObjectRecord {
    fn from(object: SpectralObject) -> Self {
        Self { channels: object.channels, energy: object.energy, capacity: object.capacity, physics: object.physics }
    }
}
