//! Time evolution of a static spectrum under deep-water dispersion.
//!
//! Every call starts again from the initial spectrum with a fresh phase
//! `ω·t`, so nothing accumulates between frames.

use std::f64::consts::TAU;

use glam::Vec2;
use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use super::GridExtent;
use crate::params::physics_constants::GRAVITY;

/// What the evolved buffer feeds once transformed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolveVariant {
    /// Real height field
    Height,
    /// Horizontal displacement, x in the real channel and y in the imaginary one
    Displacement,
    /// Surface slope (normal detail), packed like `Displacement`
    Gradient,
}

/// Per-frame spectrum evolution for one grid
#[derive(Debug, Clone, Copy)]
pub struct FrequencyEvolver {
    extent: GridExtent,
    frequency_modulus: Vec2,
    variant: EvolveVariant,
}

impl FrequencyEvolver {
    /// # Arguments
    /// * `extent` - Grid size
    /// * `frequency_modulus` - 2π / tile size (rad/m per bin)
    /// * `variant` - Output quantity
    pub fn new(extent: GridExtent, frequency_modulus: Vec2, variant: EvolveVariant) -> Self {
        Self {
            extent,
            frequency_modulus,
            variant,
        }
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn variant(&self) -> EvolveVariant {
        self.variant
    }

    pub fn set_frequency_modulus(&mut self, frequency_modulus: Vec2) {
        self.frequency_modulus = frequency_modulus;
    }

    /// Wave vector of bin (x, y)
    pub fn wave_vector(&self, x: u32, y: u32) -> Vec2 {
        self.frequency_modulus * self.extent.aliased(x, y)
    }

    /// e^{iωt} for wave vector `k`, with ω = sqrt(g·|k|)
    pub fn rotation(k: Vec2, time: f64) -> Complex32 {
        let omega = (GRAVITY as f64 * k.length() as f64).sqrt();
        let phase = (omega * time).rem_euclid(TAU);
        Complex32::new(phase.cos() as f32, phase.sin() as f32)
    }

    /// Whether bin (x, y) sits on the self-mirrored Nyquist row or column
    pub fn is_nyquist(&self, x: u32, y: u32) -> bool {
        2 * x == self.extent.width || 2 * y == self.extent.height
    }

    /// Evolved value of a single bin.
    ///
    /// Packed variants are zero on the Nyquist row and column: there the
    /// mirrored bin is the bin itself, so the two axes could not be kept
    /// apart in one complex transform.
    pub fn evolve_bin(&self, initial: &[Complex32], x: u32, y: u32, time: f64) -> Complex32 {
        if self.variant != EvolveVariant::Height && self.is_nyquist(x, y) {
            return Complex32::new(0.0, 0.0);
        }

        let extent = self.extent;
        let k = self.wave_vector(x, y);
        let rotation = Self::rotation(k, time);

        let mirror = extent.mirror(x, y);
        let a = initial[extent.index(x as i32, y as i32)];
        let a_neg = initial[extent.index(mirror.x as i32, mirror.y as i32)];

        let h = a * rotation + (a_neg * rotation).conj();

        match self.variant {
            EvolveVariant::Height => h,
            EvolveVariant::Displacement => {
                let dir = k.normalize_or_zero();
                h * Complex32::new(-dir.y, dir.x)
            }
            EvolveVariant::Gradient => h * Complex32::new(-k.y, k.x),
        }
    }

    /// Evolve the whole grid into `output`.
    ///
    /// Both slices must hold `extent.len()` values.
    pub fn evolve(&self, initial: &[Complex32], time: f64, output: &mut [Complex32]) {
        let width = self.extent.width as usize;
        output
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, bin) in row.iter_mut().enumerate() {
                    *bin = self.evolve_bin(initial, x as u32, y as u32, time);
                }
            });
    }
}
