//! CPU-side textures with explicit mip chains.

use glam::{UVec2, Vec2, Vec4};

use crate::error::ResourceError;

/// Channel layout of a texture once uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// Baked height/displacement and gradient/jacobian maps
    Rgba16Float,
    /// Two-channel slope map
    Rg16Float,
}

impl TextureFormat {
    pub fn channels(self) -> usize {
        match self {
            TextureFormat::Rgba16Float => 4,
            TextureFormat::Rg16Float => 2,
        }
    }
}

/// One level of a mip chain
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<Vec4>,
}

impl MipLevel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texels: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Texel at a wrapped coordinate
    pub fn fetch(&self, x: i32, y: i32) -> Vec4 {
        let x = x.rem_euclid(self.width as i32) as usize;
        let y = y.rem_euclid(self.height as i32) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Bilinear sample with repeat addressing; `uv` in [0, 1) covers the level
    pub fn sample_bilinear(&self, uv: Vec2) -> Vec4 {
        let pos = uv * Vec2::new(self.width as f32, self.height as f32) - Vec2::splat(0.5);
        let base = pos.floor();
        let frac = pos - base;
        let (x, y) = (base.x as i32, base.y as i32);

        let top = self.fetch(x, y).lerp(self.fetch(x + 1, y), frac.x);
        let bottom = self.fetch(x, y + 1).lerp(self.fetch(x + 1, y + 1), frac.x);
        top.lerp(bottom, frac.y)
    }
}

/// Texture with a full or partial mip chain
#[derive(Debug, Clone)]
pub struct Texture {
    label: String,
    format: TextureFormat,
    levels: Vec<MipLevel>,
}

impl Texture {
    /// Allocate `mip_levels` zeroed levels starting at `size`
    pub fn new(label: impl Into<String>, format: TextureFormat, size: UVec2, mip_levels: u32) -> Self {
        let levels = (0..mip_levels.max(1))
            .map(|level| {
                let width = (size.x >> level).max(1);
                let height = (size.y >> level).max(1);
                MipLevel::new(width, height)
            })
            .collect();

        Self {
            label: label.into(),
            format,
            levels,
        }
    }

    /// Mip count for a chain that stops at 1x1
    pub fn full_mip_count(size: UVec2) -> u32 {
        size.x.max(size.y).max(1).ilog2() + 1
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn size(&self) -> UVec2 {
        self.levels[0].size()
    }

    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    pub fn level(&self, level: u32) -> Result<&MipLevel, ResourceError> {
        self.levels
            .get(level as usize)
            .ok_or_else(|| self.missing_level(level))
    }

    pub fn level_mut(&mut self, level: u32) -> Result<&mut MipLevel, ResourceError> {
        let missing = self.missing_level(level);
        self.levels.get_mut(level as usize).ok_or(missing)
    }

    /// Source level and destination level for a downsample step
    pub fn level_pair_mut(
        &mut self,
        dst_level: u32,
    ) -> Result<(&MipLevel, &mut MipLevel), ResourceError> {
        if dst_level == 0 || dst_level as usize >= self.levels.len() {
            return Err(self.missing_level(dst_level));
        }
        let (head, tail) = self.levels.split_at_mut(dst_level as usize);
        Ok((&head[dst_level as usize - 1], &mut tail[0]))
    }

    fn missing_level(&self, level: u32) -> ResourceError {
        ResourceError::MissingMipLevel {
            label: self.label.clone(),
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_chain_sizes() {
        let texture = Texture::new("t", TextureFormat::Rgba16Float, UVec2::new(16, 4), 5);
        let sizes: Vec<UVec2> = texture.levels().iter().map(|l| l.size()).collect();

        assert_eq!(
            sizes,
            vec![
                UVec2::new(16, 4),
                UVec2::new(8, 2),
                UVec2::new(4, 1),
                UVec2::new(2, 1),
                UVec2::new(1, 1)
            ]
        );
        assert_eq!(Texture::full_mip_count(UVec2::new(16, 4)), 5);
        assert_eq!(Texture::full_mip_count(UVec2::new(1, 1)), 1);
    }

    #[test]
    fn test_bilinear_sample_at_texel_centre_is_exact() {
        let mut level = MipLevel::new(4, 4);
        for (i, texel) in level.texels.iter_mut().enumerate() {
            *texel = Vec4::splat(i as f32);
        }

        let uv = Vec2::new(2.5 / 4.0, 1.5 / 4.0);
        assert_eq!(level.sample_bilinear(uv), Vec4::splat(6.0));
    }

    #[test]
    fn test_bilinear_sample_wraps() {
        let mut level = MipLevel::new(2, 1);
        level.texels[0] = Vec4::splat(0.0);
        level.texels[1] = Vec4::splat(4.0);

        // Halfway between the last and the first texel across the seam
        assert_eq!(level.sample_bilinear(Vec2::new(0.0, 0.5)), Vec4::splat(2.0));
    }

    #[test]
    fn test_level_pair_bounds() {
        let mut texture = Texture::new("t", TextureFormat::Rg16Float, UVec2::new(8, 8), 2);
        assert!(texture.level_pair_mut(0).is_err());
        assert!(texture.level_pair_mut(2).is_err());

        let (src, dst) = texture.level_pair_mut(1).unwrap();
        assert_eq!(src.size(), UVec2::new(8, 8));
        assert_eq!(dst.size(), UVec2::new(4, 4));
    }
}
