//! Frequency-domain wave spectra: grid primitives, synthesis, downsampling and
//! per-frame evolution.
//!
//! Grids are row-major and periodic. A bin index maps to a signed spatial
//! frequency through [`alias`]; values past the Nyquist midpoint are negative
//! frequencies.

mod downsample;
mod evolve;
mod phillips;

use glam::{UVec2, Vec2};
use rustfft::num_complex::Complex32;

pub use downsample::DistributionDownsampler;
pub use evolve::{EvolveVariant, FrequencyEvolver};
pub use phillips::{phillips, SeedMode, SpectrumParams, SpectrumSynthesizer};

/// Map an index to its signed frequency representation.
///
/// The index is folded into `[0, size)` first, so `alias(i, n) == alias(i + n, n)`
/// holds for every integer.
pub fn alias(index: i32, size: u32) -> i32 {
    let size = size as i32;
    let wrapped = index.rem_euclid(size);
    if wrapped < size / 2 {
        wrapped
    } else {
        wrapped - size
    }
}

/// Toroidal fold of a signed index into `[0, size)`
pub fn wrap(index: i32, size: u32) -> u32 {
    index.rem_euclid(size as i32) as u32
}

/// Index of the negative frequency partner: `(size - i) mod size`
pub fn mirror_index(index: u32, size: u32) -> u32 {
    if index == 0 {
        0
    } else {
        size - index
    }
}

/// Width and height of a grid, in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridExtent {
    pub width: u32,
    pub height: u32,
}

impl GridExtent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(samples: u32) -> Self {
        Self::new(samples, samples)
    }

    /// Extent reduced by a power-of-two shift on both axes (never below 1)
    pub fn shifted(self, shift: u32) -> Self {
        Self::new((self.width >> shift).max(1), (self.height >> shift).max(1))
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_power_of_two(&self) -> bool {
        self.width.is_power_of_two() && self.height.is_power_of_two()
    }

    /// Row-major index of a wrapped coordinate
    pub fn index(&self, x: i32, y: i32) -> usize {
        wrap(y, self.height) as usize * self.width as usize + wrap(x, self.width) as usize
    }

    /// Signed frequency of bin (x, y) on both axes
    pub fn aliased(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            alias(x as i32, self.width) as f32,
            alias(y as i32, self.height) as f32,
        )
    }

    /// Bin holding the negative frequency of (x, y)
    pub fn mirror(&self, x: u32, y: u32) -> UVec2 {
        UVec2::new(mirror_index(x, self.width), mirror_index(y, self.height))
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Row-major 2D array of complex values
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexGrid {
    extent: GridExtent,
    data: Vec<Complex32>,
}

impl ComplexGrid {
    /// Zero-filled grid
    pub fn new(extent: GridExtent) -> Self {
        Self {
            extent,
            data: vec![Complex32::new(0.0, 0.0); extent.len()],
        }
    }

    /// Wrap existing row-major data; `None` if the length does not match
    pub fn from_vec(extent: GridExtent, data: Vec<Complex32>) -> Option<Self> {
        (data.len() == extent.len()).then_some(Self { extent, data })
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    /// Bin at a wrapped coordinate
    pub fn at(&self, x: i32, y: i32) -> Complex32 {
        self.data[self.extent.index(x, y)]
    }

    pub fn set(&mut self, x: i32, y: i32, value: Complex32) {
        let index = self.extent.index(x, y);
        self.data[index] = value;
    }

    pub fn as_slice(&self) -> &[Complex32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<Complex32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_periodicity() {
        for n in [2u32, 4, 8, 64, 256] {
            assert_eq!(alias(0, n), 0);
            for i in -3 * n as i32..3 * n as i32 {
                assert_eq!(alias(i, n), alias(i + n as i32, n), "i={} n={}", i, n);
            }
        }
    }

    #[test]
    fn test_alias_nyquist_split() {
        assert_eq!(alias(3, 8), 3);
        assert_eq!(alias(4, 8), -4);
        assert_eq!(alias(7, 8), -1);
        assert_eq!(alias(-1, 8), -1);
    }

    #[test]
    fn test_wrap_and_mirror() {
        assert_eq!(wrap(-1, 8), 7);
        assert_eq!(wrap(8, 8), 0);
        assert_eq!(mirror_index(0, 8), 0);
        assert_eq!(mirror_index(1, 8), 7);
        assert_eq!(mirror_index(4, 8), 4);
    }

    #[test]
    fn test_shifted_extent() {
        let extent = GridExtent::square(256);
        assert_eq!(extent.shifted(0), extent);
        assert_eq!(extent.shifted(1), GridExtent::square(128));
        assert_eq!(GridExtent::square(2).shifted(4), GridExtent::square(1));
    }

    #[test]
    fn test_grid_wrapped_access() {
        let mut grid = ComplexGrid::new(GridExtent::new(4, 2));
        grid.set(-1, 0, Complex32::new(1.0, 2.0));

        assert_eq!(grid.at(3, 0), Complex32::new(1.0, 2.0));
        assert_eq!(grid.at(3, 2), Complex32::new(1.0, 2.0));
        assert!(ComplexGrid::from_vec(GridExtent::new(4, 2), vec![]).is_none());
    }
}
