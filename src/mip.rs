//! Mip chain generation for the ocean output textures.

use glam::{Vec2, Vec4};
use rayon::prelude::*;

use crate::error::ResourceError;
use crate::graph::{CommandBuffer, ImageLayout};
use crate::texture::{MipLevel, Texture};

/// Downsample kernel used between two levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MipFilter {
    /// Four bilinear taps at ±half a destination texel on both axes,
    /// weighted 0.25 each. Keeps diagonal detail of the wave maps.
    RotatedBox,
    /// One bilinear tap at the destination texel centre
    Linear,
}

impl MipFilter {
    fn kernel(self) -> &'static str {
        match self {
            MipFilter::RotatedBox => "mip_rotated_box",
            MipFilter::Linear => "mip_linear",
        }
    }
}

/// Fills the levels of a texture from the level above
#[derive(Debug, Clone, Copy)]
pub struct MipGenerator {
    filter: MipFilter,
}

impl MipGenerator {
    pub fn new(filter: MipFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> MipFilter {
        self.filter
    }

    /// Value of destination texel (x, y) computed from `src`
    pub fn filter_texel(&self, src: &MipLevel, dst_size: Vec2, x: u32, y: u32) -> Vec4 {
        let inv_size = Vec2::ONE / dst_size;
        let uv = (Vec2::new(x as f32, y as f32) + 0.5) * inv_size;

        match self.filter {
            MipFilter::Linear => src.sample_bilinear(uv),
            MipFilter::RotatedBox => {
                let offset = 0.5 * inv_size;
                let taps = [
                    Vec2::new(-offset.x, -offset.y),
                    Vec2::new(offset.x, -offset.y),
                    Vec2::new(-offset.x, offset.y),
                    Vec2::new(offset.x, offset.y),
                ];
                taps.iter()
                    .map(|tap| 0.25 * src.sample_bilinear(uv + *tap))
                    .sum()
            }
        }
    }

    /// Regenerate every level after `base_level`.
    ///
    /// Levels are processed in order, each one moving from shader-read to
    /// shader-write and back while it is written.
    pub fn generate(
        &self,
        texture: &mut Texture,
        base_level: u32,
        commands: &mut CommandBuffer,
    ) -> Result<(), ResourceError> {
        let label = texture.label().to_string();
        for level in base_level + 1..texture.mip_count() {
            commands.transition(&label, level, ImageLayout::ShaderRead, ImageLayout::ShaderWrite);

            let (src, dst) = texture.level_pair_mut(level)?;
            let dst_size = dst.size().as_vec2();
            let width = dst.width as usize;
            dst.texels
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, texel) in row.iter_mut().enumerate() {
                        *texel = self.filter_texel(src, dst_size, x as u32, y as u32);
                    }
                });
            commands.dispatch(self.filter.kernel(), dst.texels.len());

            commands.transition(&label, level, ImageLayout::ShaderWrite, ImageLayout::ShaderRead);
        }
        Ok(())
    }
}
