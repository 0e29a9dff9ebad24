//! Phillips spectrum and initial wave amplitude synthesis.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rustfft::num_complex::Complex32;

use super::{ComplexGrid, GridExtent};
use crate::params::physics_constants::DEFAULT_SEED;

/// Phillips spectrum for wave vector `k`.
///
/// Exactly zero at `k == 0` (the DC term carries no energy).
///
/// # Arguments
/// * `k` - Wave vector (rad/m)
/// * `max_wave_length` - Small-wave suppression length (m)
/// * `wind_direction` - Normalised wind direction
/// * `length_scale` - Largest wind wave, L = V² / g (m)
pub fn phillips(k: Vec2, max_wave_length: f32, wind_direction: Vec2, length_scale: f32) -> f32 {
    let k_len = k.length();
    if k_len == 0.0 {
        return 0.0;
    }

    let k_len2 = k_len * k_len;
    let dot = (k / k_len).dot(wind_direction);
    let suppression = (-k_len2 * max_wave_length * max_wave_length).exp();
    let wind = (-1.0 / ((k_len * length_scale) * (k_len * length_scale))).exp();

    dot * dot * suppression * wind / (k_len2 * k_len2)
}

/// Where the synthesizer's random stream comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// Reproducible stream
    Fixed(u64),
    /// Fresh OS entropy for every synthesis
    Entropy,
}

impl SeedMode {
    /// `disableRandomSeed` selects the fixed default seed
    pub fn from_disable_random_seed(disable: bool) -> Self {
        if disable {
            SeedMode::Fixed(DEFAULT_SEED)
        } else {
            SeedMode::Entropy
        }
    }

    fn rng(self) -> StdRng {
        match self {
            SeedMode::Fixed(seed) => StdRng::seed_from_u64(seed),
            SeedMode::Entropy => StdRng::from_entropy(),
        }
    }
}

/// Inputs for one spectrum grid
#[derive(Debug, Clone, Copy)]
pub struct SpectrumParams {
    /// Physical tile size the grid covers (m)
    pub tile_size: Vec2,
    pub amplitude: f32,
    pub max_wave_length: f32,
    /// Normalised wind direction
    pub wind_direction: Vec2,
    /// L = V² / g (m)
    pub length_scale: f32,
}

impl SpectrumParams {
    /// Angular frequency step per bin: 2π / tile size
    pub fn frequency_modulus(&self) -> Vec2 {
        Vec2::splat(TAU) / self.tile_size
    }
}

/// Produces initial frequency-domain amplitudes from wind parameters
pub struct SpectrumSynthesizer {
    rng: StdRng,
}

impl SpectrumSynthesizer {
    pub fn new(seed: SeedMode) -> Self {
        Self { rng: seed.rng() }
    }

    /// Restart the random stream
    pub fn reseed(&mut self, seed: SeedMode) {
        self.rng = seed.rng();
    }

    /// Fill a grid with `gaussian * amplitude * sqrt(0.5 * Phillips(k))`.
    ///
    /// Bins are visited in row-major order, drawing the real then imaginary
    /// part of each Gaussian sample.
    pub fn synthesize(&mut self, extent: GridExtent, params: &SpectrumParams) -> ComplexGrid {
        let modulus = params.frequency_modulus();
        let mut grid = ComplexGrid::new(extent);

        for (index, bin) in grid.as_mut_slice().iter_mut().enumerate() {
            let x = (index % extent.width as usize) as u32;
            let y = (index / extent.width as usize) as u32;
            let k = modulus * extent.aliased(x, y);

            let re: f32 = self.rng.sample(StandardNormal);
            let im: f32 = self.rng.sample(StandardNormal);
            let energy = phillips(
                k,
                params.max_wave_length,
                params.wind_direction,
                params.length_scale,
            );

            *bin = Complex32::new(re, im) * (params.amplitude * (0.5 * energy).sqrt());
        }

        grid
    }
}
