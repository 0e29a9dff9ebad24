//! PNG dumps of the baked ocean maps for headless inspection.

use std::path::Path;

use glam::Vec4;

use crate::error::CaptureError;
use crate::ocean::OceanFft;
use crate::params::CaptureConfig;
use crate::texture::{MipLevel, Texture, TextureFormat};

/// Map names used in capture file names
pub const HEIGHT_DISPLACEMENT: &str = "height_displacement";
pub const GRADIENT_JACOBIAN: &str = "gradient_jacobian";
pub const NORMALS: &str = "normals";

/// Remap each channel of a level into 0..=255 using its own min/max.
///
/// Channels the format does not carry are written as 0, alpha as 255.
/// A flat channel maps to mid-grey.
pub fn encode_rgba8(level: &MipLevel, format: TextureFormat) -> Vec<u8> {
    let channels = format.channels();
    let (min, max) = level.texels.iter().fold(
        (Vec4::splat(f32::INFINITY), Vec4::splat(f32::NEG_INFINITY)),
        |(min, max), texel| (min.min(*texel), max.max(*texel)),
    );
    let range = max - min;

    let mut bytes = Vec::with_capacity(level.texels.len() * 4);
    for texel in &level.texels {
        for c in 0..4 {
            let byte = if c < channels {
                if range[c] > 0.0 && range[c].is_finite() {
                    (((texel[c] - min[c]) / range[c]) * 255.0).round().clamp(0.0, 255.0) as u8
                } else {
                    128
                }
            } else if c == 3 {
                255
            } else {
                0
            };
            bytes.push(byte);
        }
    }
    bytes
}

/// Write one level as an RGBA8 PNG
pub fn save_level_png(
    path: &Path,
    level: &MipLevel,
    format: TextureFormat,
) -> Result<(), CaptureError> {
    let pixels = encode_rgba8(level, format);
    image::save_buffer(
        path,
        &pixels,
        level.width,
        level.height,
        image::ColorType::Rgba8,
    )
    .map_err(|source| CaptureError::Save {
        path: path.to_path_buf(),
        source,
    })
}

fn save_texture(path: &Path, texture: &Texture) -> Result<(), CaptureError> {
    let level = texture
        .levels()
        .first()
        .ok_or_else(|| CaptureError::EmptyTexture(texture.label().to_string()))?;
    save_level_png(path, level, texture.format())
}

/// Dumps level 0 of every output map when the frame is due
pub struct FrameCapture {
    config: CaptureConfig,
    written: usize,
}

impl FrameCapture {
    /// Create the output directory up front
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        std::fs::create_dir_all(&config.output_dir).map_err(|source| CaptureError::CreateDir {
            path: config.output_dir.clone(),
            source,
        })?;
        Ok(Self { config, written: 0 })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Number of frames written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Returns whether anything was written
    pub fn capture(&mut self, ocean: &OceanFft, frame: usize) -> Result<bool, CaptureError> {
        if !self.config.captures(frame) {
            return Ok(false);
        }

        for (map, texture) in [
            (HEIGHT_DISPLACEMENT, ocean.height_displacement()),
            (GRADIENT_JACOBIAN, ocean.gradient_jacobian()),
            (NORMALS, ocean.normals()),
        ] {
            save_texture(&self.config.frame_path(map, frame), texture)?;
        }
        self.written += 1;
        log::debug!("Captured frame {} to {:?}", frame, self.config.output_dir);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_normalises_per_channel() {
        let mut level = MipLevel::new(2, 1);
        level.texels[0] = Vec4::new(-2.0, 10.0, 5.0, 0.0);
        level.texels[1] = Vec4::new(2.0, 20.0, 5.0, 1.0);

        let bytes = encode_rgba8(&level, TextureFormat::Rgba16Float);
        assert_eq!(&bytes[0..4], &[0, 0, 128, 0]);
        assert_eq!(&bytes[4..8], &[255, 255, 128, 255]);
    }

    #[test]
    fn test_encode_two_channel_format() {
        let mut level = MipLevel::new(2, 1);
        level.texels[0] = Vec4::new(0.0, 0.0, 9.0, 9.0);
        level.texels[1] = Vec4::new(1.0, 1.0, -9.0, -9.0);

        let bytes = encode_rgba8(&level, TextureFormat::Rg16Float);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 255]);
        assert_eq!(&bytes[4..8], &[255, 255, 0, 255]);
    }

    #[test]
    fn test_save_level_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.png");
        let mut level = MipLevel::new(4, 2);
        level.texels[3] = Vec4::ONE;

        save_level_png(&path, &level, TextureFormat::Rgba16Float).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(3, 0).0, [255, 255, 255, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("level.png");
        let level = MipLevel::new(2, 2);

        assert!(matches!(
            save_level_png(&path, &level, TextureFormat::Rg16Float),
            Err(CaptureError::Save { .. })
        ));
    }
}
