//! FFT ocean configuration: wave spectrum, grid resolution and patch layout.

use std::path::Path;

use glam::{UVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::spectrum::GridExtent;

/// Physical and visual tuning constants (not configurable)
pub mod physics_constants {
    /// Gravitational acceleration (m/s²), deep-water dispersion constant
    pub const GRAVITY: f32 = 9.81;

    /// Horizontal displacement scale applied when baking (visual tuning)
    pub const DISPLACEMENT_LAMBDA: f32 = 1.2;

    /// Strength of the normal-detail slopes relative to the height spectrum.
    ///
    /// Applied to the normal spectrum amplitude, so the normals texture is
    /// already scaled; consumers sample it as-is.
    pub const NORMAL_DETAIL_SCALE: f32 = 0.3;

    /// Seed used when `disableRandomSeed` is set
    pub const DEFAULT_SEED: u64 = 5489;

    /// Hardware tessellation factor limit
    pub const MAX_TESSELLATION: f32 = 64.0;
}

use physics_constants::GRAVITY;

/// FFT ocean simulation parameters
///
/// Field names follow the scene-file keywords (camelCase in JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OceanFftConfig {
    /// Use a fixed RNG seed so the spectrum is reproducible
    pub disable_random_seed: bool,

    /// Physical tile size in meters (X, Z)
    pub size: Vec2,

    /// Heightmap samples per side (power of two)
    pub height_map_samples: u32,

    /// Displacement grid resolution = heightMapSamples >> this
    pub displacement_downsample: u32,

    /// Normal-detail frequency multiplier (normal tile = size / this)
    #[serde(rename = "normalMapFreqMod")]
    pub normal_freq_mod: Vec2,

    /// Spectrum amplitude scalar
    pub amplitude: f32,

    /// Wind direction in the XZ plane (normalised on use)
    pub wind_direction: Vec2,

    /// Wind velocity (m/s)
    pub wind_velocity: f32,

    /// Small-wave suppression length (meters)
    pub max_wave_length: f32,

    /// Tessellated patch size in heightmap texels (X, Z)
    pub patch_size: Vec2,

    /// Number of patches per side
    pub blocks_count: UVec2,

    /// Distance (meters) at which tessellation LOD 0 ends
    #[serde(rename = "lod0Distance")]
    pub lod0_distance: f32,
}

impl Default for OceanFftConfig {
    fn default() -> Self {
        Self {
            disable_random_seed: false,
            size: Vec2::new(200.0, 200.0),
            height_map_samples: 256,
            displacement_downsample: 1,
            normal_freq_mod: Vec2::new(7.3, 7.3),
            amplitude: 1.0,
            wind_direction: Vec2::new(1.0, 1.0),
            wind_velocity: 10.0,
            max_wave_length: 0.02,
            patch_size: Vec2::new(32.0, 32.0),
            blocks_count: UVec2::new(8, 8),
            lod0_distance: 50.0,
        }
    }
}

impl OceanFftConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Load a config file, falling back to defaults when it is unusable
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Ignoring ocean config {}: {}, using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Validate configuration (sample count must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), ConfigError> {
        let samples = self.height_map_samples;
        if samples < 2 || !samples.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo(samples));
        }
        if self.displacement_downsample >= samples.trailing_zeros() {
            return Err(ConfigError::DownsampleTooLarge {
                shift: self.displacement_downsample,
                samples,
            });
        }

        positive_vec("size", self.size)?;
        positive_vec("normalMapFreqMod", self.normal_freq_mod)?;
        positive_vec("patchSize", self.patch_size)?;
        positive("windVelocity", self.wind_velocity)?;
        positive("lod0Distance", self.lod0_distance)?;
        if self.max_wave_length < 0.0 || !self.max_wave_length.is_finite() {
            return Err(ConfigError::NonPositive {
                field: "maxWaveLength",
            });
        }
        if self.blocks_count.x == 0 || self.blocks_count.y == 0 {
            return Err(ConfigError::NonPositive {
                field: "blocksCount",
            });
        }
        if !self.wind_direction.is_finite() || self.wind_direction.length_squared() == 0.0 {
            return Err(ConfigError::ZeroWindDirection);
        }
        if !self.amplitude.is_finite() {
            return Err(ConfigError::NonFiniteAmplitude);
        }
        Ok(())
    }

    /// Height and normal grid extent
    pub fn extent(&self) -> GridExtent {
        GridExtent::square(self.height_map_samples)
    }

    /// Displacement grid extent (height extent >> displacementDownsample)
    pub fn displacement_extent(&self) -> GridExtent {
        self.extent().shifted(self.displacement_downsample)
    }

    /// Physical size of the normal-detail tile (meters)
    pub fn normal_tile_size(&self) -> Vec2 {
        self.size / self.normal_freq_mod
    }

    /// Largest wave arising from the wind: L = V² / g
    pub fn wind_length_scale(&self) -> f32 {
        self.wind_velocity * self.wind_velocity / GRAVITY
    }

    pub fn wind_direction_normalized(&self) -> Vec2 {
        self.wind_direction.normalize_or_zero()
    }

    /// Reject changes that would require resizing the grids
    pub fn check_same_resolution(&self, other: &Self) -> Result<(), ConfigError> {
        if self.height_map_samples != other.height_map_samples {
            return Err(ConfigError::ResolutionChanged {
                field: "heightMapSamples",
                old: self.height_map_samples,
                new: other.height_map_samples,
            });
        }
        if self.displacement_downsample != other.displacement_downsample {
            return Err(ConfigError::ResolutionChanged {
                field: "displacementDownsample",
                old: self.displacement_downsample,
                new: other.displacement_downsample,
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field })
    }
}

fn positive_vec(field: &'static str, value: Vec2) -> Result<(), ConfigError> {
    positive(field, value.x)?;
    positive(field, value.y)
}
