//! Packs the transformed height and displacement fields into the two maps
//! the renderer samples.
//!
//! - heightDisplacement.rgb = (height, displacement.x, displacement.y)
//! - gradientJacobian.rgb = (gradient.x, gradient.y, jacobian)

use glam::{UVec2, Vec2, Vec4};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use crate::error::ResourceError;
use crate::params::physics_constants::DISPLACEMENT_LAMBDA;
use crate::spectrum::GridExtent;
use crate::texture::{MipLevel, Texture, TextureFormat};

/// Mip count of the baked maps: log2(max side) - 2, at least 1
pub fn baked_mip_count(extent: GridExtent) -> u32 {
    extent
        .width
        .max(extent.height)
        .max(1)
        .ilog2()
        .saturating_sub(2)
        .max(1)
}

/// The two textures produced by the baker
#[derive(Debug, Clone)]
pub struct BakedTexturePair {
    pub height_displacement: Texture,
    pub gradient_jacobian: Texture,
}

impl BakedTexturePair {
    pub fn new(extent: GridExtent) -> Self {
        let size = UVec2::new(extent.width, extent.height);
        let mips = baked_mip_count(extent);
        Self {
            height_displacement: Texture::new(
                "HeightDisplacement",
                TextureFormat::Rgba16Float,
                size,
                mips,
            ),
            gradient_jacobian: Texture::new(
                "GradientJacobian",
                TextureFormat::Rgba16Float,
                size,
                mips,
            ),
        }
    }
}

/// Combines the spatial fields into level 0 of the baked maps
#[derive(Debug, Clone, Copy)]
pub struct HeightGradientBaker {
    height_extent: GridExtent,
    displacement_extent: GridExtent,
    displacement_downsample: u32,
    /// Samples per meter on the height grid
    gradient_scale: Vec2,
    /// Samples per meter on the displacement grid
    jacobian_scale: Vec2,
}

impl HeightGradientBaker {
    pub fn new(height_extent: GridExtent, displacement_downsample: u32, tile_size: Vec2) -> Self {
        let displacement_extent = height_extent.shifted(displacement_downsample);
        Self {
            height_extent,
            displacement_extent,
            displacement_downsample,
            gradient_scale: height_extent.as_vec2() / tile_size,
            jacobian_scale: displacement_extent.as_vec2() / tile_size,
        }
    }

    pub fn set_tile_size(&mut self, tile_size: Vec2) {
        self.gradient_scale = self.height_extent.as_vec2() / tile_size;
        self.jacobian_scale = self.displacement_extent.as_vec2() / tile_size;
    }

    /// Displacement grid coordinate for a height grid coordinate
    pub fn displacement_coord(&self, x: u32, y: u32) -> (u32, u32) {
        (
            x >> self.displacement_downsample,
            y >> self.displacement_downsample,
        )
    }

    fn height(&self, heights: &[Complex32], x: i32, y: i32) -> f32 {
        heights[self.height_extent.index(x, y)].re
    }

    fn displacement(&self, displacement: &[Complex32], x: i32, y: i32) -> Vec2 {
        let value = displacement[self.displacement_extent.index(x, y)];
        Vec2::new(value.re, value.im) * DISPLACEMENT_LAMBDA
    }

    /// Packed (height, displacement, gradient, jacobian) for one texel
    pub fn bake_texel(
        &self,
        heights: &[Complex32],
        displacement: &[Complex32],
        x: u32,
        y: u32,
    ) -> (Vec4, Vec4) {
        let (xi, yi) = (x as i32, y as i32);
        let height = self.height(heights, xi, yi);
        let gradient = self.gradient_scale
            * 0.5
            * Vec2::new(
                self.height(heights, xi + 1, yi) - self.height(heights, xi - 1, yi),
                self.height(heights, xi, yi + 1) - self.height(heights, xi, yi - 1),
            );

        let (dx, dy) = self.displacement_coord(x, y);
        let (dx, dy) = (dx as i32, dy as i32);
        let disp = self.displacement(displacement, dx, dy);
        let ddx = self.jacobian_scale.x
            * 0.5
            * (self.displacement(displacement, dx + 1, dy) - self.displacement(displacement, dx - 1, dy));
        let ddy = self.jacobian_scale.y
            * 0.5
            * (self.displacement(displacement, dx, dy + 1) - self.displacement(displacement, dx, dy - 1));
        let jacobian = (1.0 + ddx.x) * (1.0 + ddy.y) - ddx.y * ddy.x;

        (
            Vec4::new(height, disp.x, disp.y, 0.0),
            Vec4::new(gradient.x, gradient.y, jacobian, 0.0),
        )
    }

    /// Fill level 0 of both output levels
    pub fn bake(
        &self,
        heights: &[Complex32],
        displacement: &[Complex32],
        height_displacement: &mut MipLevel,
        gradient_jacobian: &mut MipLevel,
    ) -> Result<(), ResourceError> {
        check_len("height field", self.height_extent.len(), heights.len())?;
        check_len(
            "displacement field",
            self.displacement_extent.len(),
            displacement.len(),
        )?;
        check_len(
            "heightDisplacement level 0",
            self.height_extent.len(),
            height_displacement.texels.len(),
        )?;
        check_len(
            "gradientJacobian level 0",
            self.height_extent.len(),
            gradient_jacobian.texels.len(),
        )?;

        let width = self.height_extent.width as usize;
        height_displacement
            .texels
            .par_chunks_mut(width)
            .zip(gradient_jacobian.texels.par_chunks_mut(width))
            .enumerate()
            .for_each(|(y, (hd_row, gj_row))| {
                for (x, (hd, gj)) in hd_row.iter_mut().zip(gj_row.iter_mut()).enumerate() {
                    (*hd, *gj) = self.bake_texel(heights, displacement, x as u32, y as u32);
                }
            });
        Ok(())
    }
}

fn check_len(label: &str, expected: usize, actual: usize) -> Result<(), ResourceError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ResourceError::SizeMismatch {
            label: label.to_string(),
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(extent: GridExtent, f: impl Fn(u32, u32) -> Complex32) -> Vec<Complex32> {
        (0..extent.len())
            .map(|i| f(i as u32 % extent.width, i as u32 / extent.width))
            .collect()
    }

    #[test]
    fn test_mip_count() {
        assert_eq!(baked_mip_count(GridExtent::square(256)), 6);
        assert_eq!(baked_mip_count(GridExtent::square(8)), 1);
        assert_eq!(baked_mip_count(GridExtent::square(4)), 1);
    }

    #[test]
    fn test_unshifted_displacement_index() {
        let baker = HeightGradientBaker::new(GridExtent::square(8), 0, Vec2::splat(8.0));
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(baker.displacement_coord(x, y), (x, y));
            }
        }

        let shifted = HeightGradientBaker::new(GridExtent::square(8), 1, Vec2::splat(8.0));
        assert_eq!(shifted.displacement_coord(5, 3), (2, 1));
    }

    #[test]
    fn test_gradient_of_linear_ramp() {
        let extent = GridExtent::square(8);
        // 16 m tile: 2 m per sample. Height rises 1 m per sample along x.
        let baker = HeightGradientBaker::new(extent, 0, Vec2::splat(16.0));
        let heights = field(extent, |x, _| Complex32::new(x as f32, 0.0));
        let displacement = vec![Complex32::new(0.0, 0.0); extent.len()];

        let (hd, gj) = baker.bake_texel(&heights, &displacement, 3, 4);
        assert_eq!(hd, Vec4::new(3.0, 0.0, 0.0, 0.0));
        assert!((gj.x - 0.5).abs() < 1e-6);
        assert_eq!(gj.y, 0.0);
        // Flat displacement leaves the surface uncompressed
        assert_eq!(gj.z, 1.0);
    }

    #[test]
    fn test_gradient_wraps_at_edges() {
        let extent = GridExtent::square(4);
        let baker = HeightGradientBaker::new(extent, 0, Vec2::splat(4.0));
        let heights = field(extent, |x, _| Complex32::new(if x == 3 { 2.0 } else { 0.0 }, 0.0));
        let displacement = vec![Complex32::new(0.0, 0.0); extent.len()];

        // x = 0 reads x = 3 on its left
        let (_, gj) = baker.bake_texel(&heights, &displacement, 0, 0);
        assert!((gj.x + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_displacement_is_lambda_scaled_and_compresses() {
        let extent = GridExtent::square(8);
        let baker = HeightGradientBaker::new(extent, 1, Vec2::splat(4.0));
        let disp_extent = extent.shifted(1);
        // Displacement x converging towards column 2 of the 4x4 grid
        let displacement = field(disp_extent, |x, _| {
            Complex32::new(match x {
                1 => 0.1,
                3 => -0.1,
                _ => 0.0,
            }, 0.0)
        });
        let heights = vec![Complex32::new(0.0, 0.0); extent.len()];

        let (hd, _) = baker.bake_texel(&heights, &displacement, 2, 0);
        assert!((hd.y - 0.1 * DISPLACEMENT_LAMBDA).abs() < 1e-6);

        // Texel (4, 0) maps to displacement column 2
        let (_, gj) = baker.bake_texel(&heights, &displacement, 4, 0);
        let ddx = 0.5 * (4.0 / 4.0) * (-0.1 - 0.1) * DISPLACEMENT_LAMBDA;
        assert!((gj.z - (1.0 + ddx)).abs() < 1e-6);
        assert!(gj.z < 1.0);
    }

    #[test]
    fn test_bake_rejects_mismatched_fields() {
        let extent = GridExtent::square(4);
        let baker = HeightGradientBaker::new(extent, 1, Vec2::splat(4.0));
        let mut pair = BakedTexturePair::new(extent);
        let heights = vec![Complex32::new(0.0, 0.0); extent.len()];
        let wrong = vec![Complex32::new(0.0, 0.0); extent.len()];

        let result = baker.bake(
            &heights,
            &wrong,
            pair.height_displacement.level_mut(0).unwrap(),
            pair.gradient_jacobian.level_mut(0).unwrap(),
        );
        assert!(matches!(result, Err(ResourceError::SizeMismatch { .. })));
    }
}
