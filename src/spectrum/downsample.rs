//! Low-frequency extraction from a higher resolution spectrum.

use rustfft::num_complex::Complex32;

use super::{alias, wrap, ComplexGrid, GridExtent};

/// Derives a coarser spectrum by picking the bins whose frequencies the
/// target grid can represent. This is not a filter: each target bin is an
/// exact copy of one source bin.
#[derive(Debug, Clone, Copy)]
pub struct DistributionDownsampler {
    shift: u32,
}

impl DistributionDownsampler {
    pub fn new(shift: u32) -> Self {
        Self { shift }
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Source bin feeding target bin (x, y)
    pub fn source_index(source: GridExtent, target: GridExtent, x: u32, y: u32) -> (u32, u32) {
        let sx = wrap(alias(x as i32, target.width), source.width);
        let sy = wrap(alias(y as i32, target.height), source.height);
        (sx, sy)
    }

    /// Target extent for a given source
    pub fn target_extent(&self, source: GridExtent) -> GridExtent {
        source.shifted(self.shift)
    }

    pub fn downsample(&self, source: &ComplexGrid) -> ComplexGrid {
        let src_extent = source.extent();
        let target = self.target_extent(src_extent);
        let mut out = ComplexGrid::new(target);
        self.downsample_into(source.as_slice(), src_extent, out.as_mut_slice(), target);
        out
    }

    /// Slice form used by the frame graph (buffers are pre-allocated)
    pub fn downsample_into(
        &self,
        source: &[Complex32],
        source_extent: GridExtent,
        target: &mut [Complex32],
        target_extent: GridExtent,
    ) {
        for (index, bin) in target.iter_mut().enumerate() {
            let x = (index % target_extent.width as usize) as u32;
            let y = (index / target_extent.width as usize) as u32;
            let (sx, sy) = Self::source_index(source_extent, target_extent, x, y);
            *bin = source[source_extent.index(sx as i32, sy as i32)];
        }
    }
}
