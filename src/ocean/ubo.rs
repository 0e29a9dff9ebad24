//! Per-frame constants for the ocean surface renderer and the CPU mirror of
//! its tessellation LOD selection.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

use crate::params::physics_constants::MAX_TESSELLATION;
use crate::params::OceanFftConfig;

/// Uniform block read by the tessellation and fragment stages
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct OceanUbo {
    /// Meters per heightmap texel
    pub tile_scale: [f32; 2],
    /// Patch size in texels
    pub patch_size: [f32; 2],
    /// (log2(max level), max level)
    pub max_tess_level: [f32; 2],
    pub inv_heightmap_size: [f32; 2],
    /// Camera-follow offset, in whole patches
    pub block_offset: [f32; 2],
    pub normal_scale: [f32; 2],
    pub wind_direction: [f32; 2],
    /// 1 / lod0Distance
    pub distance_mod: f32,
    /// Simulation time (seconds)
    pub time: f32,
    pub displacement_downsample: u32,
    pub _padding: [u32; 3],
}

impl OceanUbo {
    pub fn new(config: &OceanFftConfig) -> Self {
        let mut ubo = Self::default();
        ubo.cpu_update(config, 0.0, Vec3::ZERO);
        ubo
    }

    /// Refresh from the current config, time and camera
    pub fn cpu_update(&mut self, config: &OceanFftConfig, time: f64, camera_position: Vec3) {
        let samples = config.height_map_samples as f32;
        let tile_scale = config.size / samples;
        let max_tess = max_tessellation(config.patch_size);
        let patch_world = config.patch_size * tile_scale;
        let block_offset = (Vec2::new(camera_position.x, camera_position.z) / patch_world).floor();

        self.tile_scale = tile_scale.to_array();
        self.patch_size = config.patch_size.to_array();
        self.max_tess_level = [max_tess.log2(), max_tess];
        self.inv_heightmap_size = [1.0 / samples, 1.0 / samples];
        self.block_offset = block_offset.to_array();
        self.normal_scale = config.normal_freq_mod.to_array();
        self.wind_direction = config.wind_direction_normalized().to_array();
        self.distance_mod = 1.0 / config.lod0_distance;
        self.time = time as f32;
        self.displacement_downsample = config.displacement_downsample;
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Tessellation level at LOD 0, bounded by the hardware limit
pub fn max_tessellation(patch_size: Vec2) -> f32 {
    MAX_TESSELLATION.min(patch_size.min_element())
}

/// Tessellation LOD for a point of the patch grid.
///
/// `world_pos` is in texel units on XZ; it is scaled by `tile_scale` before
/// measuring the distance to `eye`.
pub fn lod_factor(world_pos: Vec3, eye: Vec3, ubo: &OceanUbo) -> f32 {
    let tile_scale = Vec2::from(ubo.tile_scale);
    let scaled = Vec3::new(world_pos.x * tile_scale.x, world_pos.y, world_pos.z * tile_scale.y);
    let level = (((eye - scaled).length() + 1e-4) * ubo.distance_mod).log2();
    level.clamp(0.0, ubo.max_tess_level[0])
}

/// Tessellation level for a LOD: max level halved per LOD step
pub fn tess_level(lod: f32, ubo: &OceanUbo) -> f32 {
    ubo.max_tess_level[1] * (-lod).exp2()
}

/// Position inside a patch for a tessellation coordinate
pub fn lerp_vertex(patch_origin: Vec3, tess_coord: Vec2, patch_size: Vec2) -> Vec2 {
    tess_coord * patch_size + Vec2::new(patch_origin.x, patch_origin.z)
}

/// Patch origin after the camera-follow offset, in texel units
pub fn patch_position(vertex: Vec2, ubo: &OceanUbo) -> Vec3 {
    let patch_size = Vec2::from(ubo.patch_size);
    let pos = (vertex / patch_size + Vec2::from(ubo.block_offset)) * patch_size;
    Vec3::new(pos.x, 0.0, pos.y)
}

/// Outer and inner tessellation levels of a quad patch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchTessLevels {
    pub outer: Vec4,
    pub inner: f32,
}

/// Levels for the patch at `origin` as seen from `eye`.
///
/// Each edge takes the finer (lower) LOD of its two corners so that
/// neighbouring patches agree on shared edges.
pub fn patch_tess_levels(origin: Vec3, eye: Vec3, ubo: &OceanUbo) -> PatchTessLevels {
    let size = Vec3::new(ubo.patch_size[0], 0.0, ubo.patch_size[1]);
    let corners = [
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::ZERO,
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 1.0),
    ];
    let lods = Vec4::from_array(corners.map(|corner| lod_factor(origin + corner * size, eye, ubo)));

    let rotated = Vec4::new(lods.y, lods.z, lods.w, lods.x);
    let outer_lods = lods.min(rotated);
    let outer = Vec4::from_array(outer_lods.to_array().map(|lod| tess_level(lod, ubo)));

    PatchTessLevels {
        outer,
        inner: outer.max_element(),
    }
}
