//! FFT ocean: owns the spectra, the per-frame pass graph and the three output
//! textures the surface renderer samples.

pub mod mesh;
pub mod passes;
pub mod ubo;

use glam::{UVec2, Vec2, Vec3};
use rustfft::num_complex::Complex32;

use crate::bake::{BakedTexturePair, HeightGradientBaker};
use crate::error::{ConfigError, OceanError, Result};
use crate::fft::SpectralTransformEngine;
use crate::graph::{BufferId, CommandBuffer, FrameGraph, FrameInfo, ImageId, PassHandle, Resources};
use crate::mip::{MipFilter, MipGenerator};
use crate::params::OceanFftConfig;
use crate::spectrum::{DistributionDownsampler, EvolveVariant, FrequencyEvolver, GridExtent};
use crate::texture::{Texture, TextureFormat};

pub use mesh::PatchMesh;
pub use passes::spectrum_params;
pub use ubo::OceanUbo;

use passes::{
    BakePass, CopyNormalsPass, DownsamplePass, EvolvePass, MipPass, SynthesizePass, TransformPass,
};

/// The three simulated fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Height,
    Normal,
    Displacement,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Height, FieldKind::Normal, FieldKind::Displacement];

    pub fn index(self) -> usize {
        match self {
            FieldKind::Height => 0,
            FieldKind::Normal => 1,
            FieldKind::Displacement => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldKind::Height => "Height",
            FieldKind::Normal => "Normal",
            FieldKind::Displacement => "Displacement",
        }
    }

    /// Physical tile the field's grid covers (meters)
    pub fn tile_size(self, config: &OceanFftConfig) -> Vec2 {
        match self {
            FieldKind::Normal => config.normal_tile_size(),
            FieldKind::Height | FieldKind::Displacement => config.size,
        }
    }

    pub fn extent(self, config: &OceanFftConfig) -> GridExtent {
        match self {
            FieldKind::Displacement => config.displacement_extent(),
            FieldKind::Height | FieldKind::Normal => config.extent(),
        }
    }

    fn variant(self) -> EvolveVariant {
        match self {
            FieldKind::Height => EvolveVariant::Height,
            FieldKind::Normal => EvolveVariant::Gradient,
            FieldKind::Displacement => EvolveVariant::Displacement,
        }
    }
}

/// Lifecycle of a simulated field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Uninitialized,
    /// Initial spectrum generated, not yet evolved
    SpectrumSynthesized,
    /// Evolved and transformed every frame
    SteadyState,
}

/// Buffers belonging to one field
#[derive(Debug, Clone, Copy)]
struct FieldBuffers {
    initial: BufferId,
    frequency: BufferId,
    /// Spatial result and the transform's transpose buffer
    results: [BufferId; 2],
}

/// CPU FFT ocean simulation driven through a frame graph
pub struct OceanFft {
    config: OceanFftConfig,
    pending: OceanFftConfig,
    time: f64,
    resources: Resources,
    graph: FrameGraph,
    fields: [FieldBuffers; 3],
    states: [FieldState; 3],
    height_displacement: ImageId,
    gradient_jacobian: ImageId,
    normals: ImageId,
    last_passes: Vec<PassHandle>,
    last_commands: CommandBuffer,
}

impl OceanFft {
    /// Allocate every grid and texture, build the pass graph and synthesise
    /// the initial spectra.
    ///
    /// Fails on an invalid config or an FFT size the backend cannot plan.
    pub fn new(config: OceanFftConfig) -> Result<Self> {
        config.validate()?;
        let extent = config.extent();
        log::info!(
            "Creating FFT ocean: {}x{} samples, displacement {}x{}, tile {:?} m",
            extent.width,
            extent.height,
            config.displacement_extent().width,
            config.displacement_extent().height,
            config.size
        );

        let mut resources = Resources::new();
        let fields = FieldKind::ALL.map(|kind| {
            let extent = kind.extent(&config);
            FieldBuffers {
                initial: resources.create_buffer(format!("{}Initial", kind.label()), extent),
                frequency: resources.create_buffer(format!("{}Frequency", kind.label()), extent),
                results: [
                    resources.create_buffer(format!("{}Result0", kind.label()), extent),
                    resources.create_buffer(format!("{}Result1", kind.label()), extent),
                ],
            }
        });

        let baked = BakedTexturePair::new(extent);
        let height_displacement = resources.create_image(baked.height_displacement);
        let gradient_jacobian = resources.create_image(baked.gradient_jacobian);
        let normals_size = UVec2::new(extent.width, extent.height);
        let normals = resources.create_image(Texture::new(
            "Normals",
            TextureFormat::Rg16Float,
            normals_size,
            Texture::full_mip_count(normals_size),
        ));

        let mut ocean = Self {
            pending: config.clone(),
            config,
            time: 0.0,
            resources,
            graph: FrameGraph::new(),
            fields,
            states: [FieldState::Uninitialized; 3],
            height_displacement,
            gradient_jacobian,
            normals,
            last_passes: Vec::new(),
            last_commands: CommandBuffer::new(),
        };
        ocean.build_graph()?;

        ocean.run(true, false)?;
        ocean.states = [FieldState::SpectrumSynthesized; 3];
        Ok(ocean)
    }

    fn field(&self, kind: FieldKind) -> FieldBuffers {
        self.fields[kind.index()]
    }

    fn build_graph(&mut self) -> Result<()> {
        let config = &self.config;
        let height = self.fields[FieldKind::Height.index()];
        let normal = self.fields[FieldKind::Normal.index()];
        let displacement = self.fields[FieldKind::Displacement.index()];
        let buffer_size = |id: BufferId| {
            self.resources
                .buffers
                .get(id)
                .map(|buffer| buffer.byte_size())
        };

        let graph = &mut self.graph;

        let synthesize = graph.add_pass(Box::new(SynthesizePass {
            height: height.initial,
            normal: normal.initial,
        }));
        graph.add_transfer_output_buffer(synthesize, height.initial)?;
        graph.add_transfer_output_buffer(synthesize, normal.initial)?;

        let downsample = graph.add_pass(Box::new(DownsamplePass {
            downsampler: DistributionDownsampler::new(config.displacement_downsample),
            source: height.initial,
            target: displacement.initial,
        }));
        graph.add_dependency(downsample, synthesize)?;
        graph.add_input_storage_buffer(downsample, height.initial, 0, 0, buffer_size(height.initial)?)?;
        graph.add_output_storage_buffer(
            downsample,
            displacement.initial,
            1,
            0,
            buffer_size(displacement.initial)?,
        )?;

        let mut transforms = Vec::with_capacity(3);
        for kind in FieldKind::ALL {
            let buffers = self.fields[kind.index()];
            let extent = kind.extent(config);
            let params = spectrum_params(config, kind);

            let evolve = graph.add_pass(Box::new(EvolvePass {
                kind,
                evolver: FrequencyEvolver::new(extent, params.frequency_modulus(), kind.variant()),
                initial: buffers.initial,
                frequency: buffers.frequency,
            }));
            let producer = if kind == FieldKind::Displacement {
                downsample
            } else {
                synthesize
            };
            graph.add_dependency(evolve, producer)?;
            graph.add_input_storage_buffer(evolve, buffers.initial, 0, 0, buffer_size(buffers.initial)?)?;
            graph.add_output_storage_buffer(
                evolve,
                buffers.frequency,
                1,
                0,
                buffer_size(buffers.frequency)?,
            )?;

            let transform = graph.add_pass(Box::new(TransformPass {
                kind,
                engine: SpectralTransformEngine::new(extent)?,
                frequency: buffers.frequency,
                results: buffers.results,
            }));
            graph.add_dependency(transform, evolve)?;
            graph.add_input_storage_buffer(
                transform,
                buffers.frequency,
                0,
                0,
                buffer_size(buffers.frequency)?,
            )?;
            for (binding, result) in buffers.results.iter().enumerate() {
                graph.add_output_storage_buffer(
                    transform,
                    *result,
                    binding as u32 + 1,
                    0,
                    buffer_size(*result)?,
                )?;
            }
            transforms.push(transform);
        }
        let [height_transform, normal_transform, displacement_transform] = [
            transforms[FieldKind::Height.index()],
            transforms[FieldKind::Normal.index()],
            transforms[FieldKind::Displacement.index()],
        ];

        let bake = graph.add_pass(Box::new(BakePass {
            baker: HeightGradientBaker::new(config.extent(), config.displacement_downsample, config.size),
            height: height.results[0],
            displacement: displacement.results[0],
            height_displacement: self.height_displacement,
            gradient_jacobian: self.gradient_jacobian,
        }));
        graph.add_dependency(bake, height_transform)?;
        graph.add_dependency(bake, displacement_transform)?;
        graph.add_input_storage_buffer(bake, height.results[0], 0, 0, buffer_size(height.results[0])?)?;
        graph.add_input_storage_buffer(
            bake,
            displacement.results[0],
            1,
            0,
            buffer_size(displacement.results[0])?,
        )?;
        graph.add_output_storage_view(bake, self.height_displacement, 2)?;
        graph.add_output_storage_view(bake, self.gradient_jacobian, 3)?;

        let mut last_passes = Vec::with_capacity(3);
        for (name, image) in [
            ("MipHeightDisplacement", self.height_displacement),
            ("MipGradientJacobian", self.gradient_jacobian),
        ] {
            let mip = graph.add_pass(Box::new(MipPass {
                name,
                generator: MipGenerator::new(MipFilter::RotatedBox),
                image,
                compute: true,
            }));
            graph.add_dependency(mip, bake)?;
            graph.add_input_storage_view(mip, image, 0)?;
            graph.add_output_storage_view(mip, image, 1)?;
            last_passes.push(mip);
        }

        let copy_normals = graph.add_pass(Box::new(CopyNormalsPass {
            source: normal.results[0],
            image: self.normals,
        }));
        graph.add_dependency(copy_normals, normal_transform)?;
        graph.add_transfer_input_buffer(copy_normals, normal.results[0])?;
        graph.add_transfer_output_view(copy_normals, self.normals)?;

        let normals_mip = graph.add_pass(Box::new(MipPass {
            name: "MipNormals",
            generator: MipGenerator::new(MipFilter::Linear),
            image: self.normals,
            compute: false,
        }));
        graph.add_dependency(normals_mip, copy_normals)?;
        graph.add_transfer_output_view(normals_mip, self.normals)?;
        last_passes.push(normals_mip);

        graph.compile(&self.resources)?;
        self.last_passes = last_passes;
        Ok(())
    }

    fn run(&mut self, resynthesize: bool, simulate: bool) -> Result<()> {
        let frame = FrameInfo {
            time: self.time,
            resynthesize,
            simulate,
            config: &self.config,
        };
        self.last_commands = self.graph.execute(&mut self.resources, &frame)?;
        Ok(())
    }

    /// Advance the simulation by `time_delta` seconds.
    ///
    /// A config queued with [`set_config`](Self::set_config) that differs from
    /// the applied one is applied here, regenerating the spectra before the
    /// frame is evolved. A non-finite `time_delta` is rejected before the
    /// clock moves.
    pub fn update(&mut self, time_delta: f32) -> Result<()> {
        if !time_delta.is_finite() {
            return Err(OceanError::NonFiniteTimeStep(f64::from(time_delta)));
        }
        self.time += f64::from(time_delta);

        let dirty = self.pending != self.config;
        if dirty {
            log::info!("Ocean config changed, resynthesizing spectra");
            self.config = self.pending.clone();
        }

        self.run(dirty, true)?;
        self.states = [FieldState::SteadyState; 3];
        log::debug!(
            "Ocean frame at t={:.3}s: {} commands",
            self.time,
            self.last_commands.len()
        );
        Ok(())
    }

    /// Queue a new config for the next update.
    ///
    /// Grid resolutions are fixed at construction.
    pub fn set_config(&mut self, config: OceanFftConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config.check_same_resolution(&config)?;
        self.pending = config;
        Ok(())
    }

    /// Jump to an absolute simulation time
    pub fn set_time(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() {
            return Err(OceanError::NonFiniteTimeStep(time));
        }
        self.time = time;
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Config applied to the current frame
    pub fn config(&self) -> &OceanFftConfig {
        &self.config
    }

    pub fn field_state(&self, kind: FieldKind) -> FieldState {
        self.states[kind.index()]
    }

    /// Initial frequency-domain amplitudes of a field
    pub fn spectrum(&self, kind: FieldKind) -> &[Complex32] {
        &self.resources.buffers[self.field(kind).initial].data
    }

    /// Evolved spectrum of the last frame
    pub fn frequency(&self, kind: FieldKind) -> &[Complex32] {
        &self.resources.buffers[self.field(kind).frequency].data
    }

    /// Spatial field of the last frame
    pub fn spatial(&self, kind: FieldKind) -> &[Complex32] {
        &self.resources.buffers[self.field(kind).results[0]].data
    }

    /// RGBA16F: height, displacement x, displacement y
    pub fn height_displacement(&self) -> &Texture {
        &self.resources.images[self.height_displacement]
    }

    /// RGBA16F: gradient x, gradient y, jacobian
    pub fn gradient_jacobian(&self) -> &Texture {
        &self.resources.images[self.gradient_jacobian]
    }

    /// RG16F slope map with a full mip chain.
    ///
    /// Slopes already include `NORMAL_DETAIL_SCALE`; do not scale them again
    /// when shading.
    pub fn normals(&self) -> &Texture {
        &self.resources.images[self.normals]
    }

    /// Terminal passes; a consumer depending on all of them sees finished outputs
    pub fn last_passes(&self) -> &[PassHandle] {
        &self.last_passes
    }

    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    /// Commands recorded by the last graph execution
    pub fn last_commands(&self) -> &CommandBuffer {
        &self.last_commands
    }

    /// Uniform payload for the surface renderer
    pub fn ubo(&self, camera_position: Vec3) -> OceanUbo {
        let mut ubo = OceanUbo::new(&self.config);
        ubo.cpu_update(&self.config, self.time, camera_position);
        ubo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Access, ResourceRef};

    fn small_config() -> OceanFftConfig {
        OceanFftConfig {
            disable_random_seed: true,
            height_map_samples: 16,
            displacement_downsample: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_construction_synthesizes_without_simulating() {
        let ocean = OceanFft::new(small_config()).unwrap();

        for kind in FieldKind::ALL {
            assert_eq!(ocean.field_state(kind), FieldState::SpectrumSynthesized);
        }
        assert_eq!(
            ocean.last_commands().pass_names(),
            vec!["Synthesize#0", "Downsample#0"]
        );
        assert!(ocean.spectrum(FieldKind::Height).iter().any(|c| c.norm() > 0.0));
        assert!(ocean.spatial(FieldKind::Height).iter().all(|c| c.norm() == 0.0));
        assert_eq!(ocean.spectrum(FieldKind::Displacement).len(), 64);
    }

    #[test]
    fn test_update_runs_full_chain() {
        let mut ocean = OceanFft::new(small_config()).unwrap();
        ocean.update(0.016).unwrap();

        for kind in FieldKind::ALL {
            assert_eq!(ocean.field_state(kind), FieldState::SteadyState);
        }
        let names = ocean.last_commands().pass_names();
        assert_eq!(
            names,
            vec![
                "Evolve#0",
                "Transform#0",
                "Evolve#1",
                "Transform#1",
                "Evolve#2",
                "Transform#2",
                "Bake#0",
                "MipHeightDisplacement#0",
                "MipGradientJacobian#0",
                "CopyNormals#0",
                "MipNormals#0",
            ]
        );
        assert!(ocean
            .height_displacement()
            .level(0)
            .unwrap()
            .texels
            .iter()
            .any(|t| t.x != 0.0));
    }

    #[test]
    fn test_downsampled_spectrum_matches_height() {
        let ocean = OceanFft::new(small_config()).unwrap();
        let height = ocean.spectrum(FieldKind::Height);
        let displacement = ocean.spectrum(FieldKind::Displacement);
        let source = GridExtent::square(16);
        let target = GridExtent::square(8);

        for y in 0..8 {
            for x in 0..8 {
                let (sx, sy) = DistributionDownsampler::source_index(source, target, x, y);
                assert_eq!(
                    displacement[target.index(x as i32, y as i32)],
                    height[source.index(sx as i32, sy as i32)]
                );
            }
        }
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let a = OceanFft::new(small_config()).unwrap();
        let b = OceanFft::new(small_config()).unwrap();

        assert_eq!(a.spectrum(FieldKind::Height), b.spectrum(FieldKind::Height));
        assert_eq!(a.spectrum(FieldKind::Normal), b.spectrum(FieldKind::Normal));
        // Normal spectrum is drawn after the height spectrum
        assert_ne!(a.spectrum(FieldKind::Height), a.spectrum(FieldKind::Normal));
    }

    #[test]
    fn test_dirty_config_resynthesizes_once() {
        let mut ocean = OceanFft::new(small_config()).unwrap();
        let before = ocean.spectrum(FieldKind::Height).to_vec();

        ocean
            .set_config(OceanFftConfig {
                amplitude: 2.0,
                ..small_config()
            })
            .unwrap();
        ocean.update(0.016).unwrap();
        assert_eq!(ocean.last_commands().pass_names()[0], "Synthesize#0");
        let after = ocean.spectrum(FieldKind::Height);
        for (a, b) in before.iter().zip(after) {
            assert!((b - a * 2.0).norm() < 1e-5);
        }

        ocean.update(0.016).unwrap();
        assert_eq!(ocean.last_commands().pass_names()[0], "Evolve#0");
    }

    #[test]
    fn test_resolution_change_rejected() {
        let mut ocean = OceanFft::new(small_config()).unwrap();
        let result = ocean.set_config(OceanFftConfig {
            height_map_samples: 32,
            ..small_config()
        });

        assert!(matches!(result, Err(ConfigError::ResolutionChanged { .. })));
        assert_eq!(ocean.config().height_map_samples, 16);
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let config = OceanFftConfig {
            height_map_samples: 24,
            ..small_config()
        };
        assert!(OceanFft::new(config).is_err());
    }

    #[test]
    fn test_last_passes_are_terminal() {
        let ocean = OceanFft::new(small_config()).unwrap();
        let graph = ocean.graph();
        let names: Vec<&str> = ocean
            .last_passes()
            .iter()
            .map(|&pass| graph.pass_name(pass).unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["MipHeightDisplacement", "MipGradientJacobian", "MipNormals"]
        );

        let order = graph.order().unwrap();
        for pass in ocean.last_passes() {
            for other in &order {
                assert!(!graph.dependencies(*other).unwrap().contains(pass));
            }
        }
    }

    #[test]
    fn test_bake_waits_for_transforms() {
        let mut ocean = OceanFft::new(small_config()).unwrap();
        ocean.update(0.5).unwrap();

        let barriers = ocean
            .last_commands()
            .barriers_for(&ResourceRef::Buffer("HeightResult0".into()));
        assert!(barriers
            .iter()
            .any(|b| b.src == Access::ComputeWrite && b.dst == Access::ComputeRead));
    }

    #[test]
    fn test_non_finite_time_step_is_rejected() {
        let mut ocean = OceanFft::new(small_config()).unwrap();
        ocean.update(0.5).unwrap();

        assert!(matches!(
            ocean.update(f32::NAN),
            Err(OceanError::NonFiniteTimeStep(_))
        ));
        assert!(ocean.update(f32::INFINITY).is_err());
        assert!(ocean.set_time(f64::NAN).is_err());
        assert_eq!(ocean.time(), 0.5);

        ocean.update(0.016).unwrap();
        assert!(ocean.time().is_finite());
        assert!(ocean.spatial(FieldKind::Height).iter().all(|c| c.re.is_finite()));
        assert!(ocean
            .height_displacement()
            .levels()
            .iter()
            .all(|level| level.texels.iter().all(|t| t.is_finite())));
    }

    #[test]
    fn test_ubo_follows_time_and_config() {
        let mut ocean = OceanFft::new(small_config()).unwrap();
        ocean.update(0.25).unwrap();
        let ubo = ocean.ubo(Vec3::ZERO);

        assert_eq!(ubo.time, 0.25);
        assert_eq!(ubo.inv_heightmap_size, [1.0 / 16.0; 2]);
    }

    #[test]
    fn test_normals_copy_uses_transfer_layout() {
        use crate::graph::{Command, ImageLayout};

        let mut ocean = OceanFft::new(small_config()).unwrap();
        ocean.update(0.016).unwrap();

        let into_transfer = ocean.last_commands().commands().iter().any(|c| {
            matches!(
                c,
                Command::ImageTransition { image, level: 0, to: ImageLayout::TransferDst, .. }
                    if image == "Normals"
            )
        });
        assert!(into_transfer);
    }
}
