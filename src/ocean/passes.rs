//! The passes making up one ocean frame.

use glam::Vec4;
use rustfft::num_complex::Complex32;

use super::FieldKind;
use crate::bake::HeightGradientBaker;
use crate::error::{FftSeverity, Result};
use crate::fft::SpectralTransformEngine;
use crate::graph::{BufferId, Command, FrameInfo, FramePass, ImageId, ImageLayout, RecordContext};
use crate::mip::MipGenerator;
use crate::params::physics_constants::NORMAL_DETAIL_SCALE;
use crate::params::OceanFftConfig;
use crate::spectrum::{
    DistributionDownsampler, FrequencyEvolver, SeedMode, SpectrumParams, SpectrumSynthesizer,
};

/// Spectrum parameters of a synthesised field
pub fn spectrum_params(config: &OceanFftConfig, kind: FieldKind) -> SpectrumParams {
    let amplitude = match kind {
        FieldKind::Normal => config.amplitude * NORMAL_DETAIL_SCALE,
        FieldKind::Height | FieldKind::Displacement => config.amplitude,
    };
    SpectrumParams {
        tile_size: kind.tile_size(config),
        amplitude,
        max_wave_length: config.max_wave_length,
        wind_direction: config.wind_direction_normalized(),
        length_scale: config.wind_length_scale(),
    }
}

/// Generates the height and normal initial spectra on the CPU and uploads them
pub struct SynthesizePass {
    pub height: BufferId,
    pub normal: BufferId,
}

impl FramePass for SynthesizePass {
    fn name(&self) -> &str {
        "Synthesize"
    }

    fn is_compute_pass(&self) -> bool {
        false
    }

    fn is_enabled(&self, frame: &FrameInfo<'_>) -> bool {
        frame.resynthesize
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()> {
        let config = context.frame.config;
        let mut synthesizer =
            SpectrumSynthesizer::new(SeedMode::from_disable_random_seed(config.disable_random_seed));

        let [height, normal] = context
            .resources
            .buffers
            .get_many_mut([self.height, self.normal])?;
        for (buffer, kind) in [(height, FieldKind::Height), (normal, FieldKind::Normal)] {
            let grid = synthesizer.synthesize(buffer.extent(), &spectrum_params(config, kind));
            buffer.data = grid.into_vec();
            context.commands.push(Command::Copy {
                from: "staging".to_string(),
                to: buffer.label().to_string(),
            });
        }
        log::info!(
            "Synthesized {} spectra ({} seed)",
            config.extent().width,
            if config.disable_random_seed { "fixed" } else { "random" }
        );
        Ok(())
    }
}

/// Extracts the displacement spectrum from the height spectrum
pub struct DownsamplePass {
    pub downsampler: DistributionDownsampler,
    pub source: BufferId,
    pub target: BufferId,
}

impl FramePass for DownsamplePass {
    fn name(&self) -> &str {
        "Downsample"
    }

    fn is_enabled(&self, frame: &FrameInfo<'_>) -> bool {
        frame.resynthesize
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()> {
        let [source, target] = context
            .resources
            .buffers
            .get_many_mut([self.source, self.target])?;
        let target_extent = target.extent();
        self.downsampler
            .downsample_into(&source.data, source.extent(), &mut target.data, target_extent);
        context
            .commands
            .dispatch("downsample", target_extent.len());
        Ok(())
    }
}

/// Applies dispersion to one field's initial spectrum
pub struct EvolvePass {
    pub kind: FieldKind,
    pub evolver: FrequencyEvolver,
    pub initial: BufferId,
    pub frequency: BufferId,
}

impl FramePass for EvolvePass {
    fn name(&self) -> &str {
        "Evolve"
    }

    fn pass_index(&self) -> u32 {
        self.kind.index() as u32
    }

    fn is_enabled(&self, frame: &FrameInfo<'_>) -> bool {
        frame.simulate
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()> {
        if context.frame.resynthesize {
            let params = spectrum_params(context.frame.config, self.kind);
            self.evolver.set_frequency_modulus(params.frequency_modulus());
        }

        let [initial, frequency] = context
            .resources
            .buffers
            .get_many_mut([self.initial, self.frequency])?;
        self.evolver
            .evolve(&initial.data, context.frame.time, &mut frequency.data);
        context
            .commands
            .dispatch("evolve", self.evolver.extent().len());
        Ok(())
    }
}

/// Inverse FFT of one field into its first result buffer
pub struct TransformPass {
    pub kind: FieldKind,
    pub engine: SpectralTransformEngine,
    pub frequency: BufferId,
    pub results: [BufferId; 2],
}

impl FramePass for TransformPass {
    fn name(&self) -> &str {
        "Transform"
    }

    fn pass_index(&self) -> u32 {
        self.kind.index() as u32
    }

    fn is_enabled(&self, frame: &FrameInfo<'_>) -> bool {
        frame.simulate
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()> {
        let [frequency, output, transpose] = context.resources.buffers.get_many_mut([
            self.frequency,
            self.results[0],
            self.results[1],
        ])?;

        match self
            .engine
            .inverse(&frequency.data, &mut output.data, &mut transpose.data)
        {
            Ok(()) => {}
            Err(e) if e.severity() == FftSeverity::Transient => {
                log::warn!("{:?} transform skipped, keeping last frame: {}", self.kind, e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        context
            .commands
            .dispatch("fft", self.engine.extent().len());
        Ok(())
    }
}

/// Packs height, displacement, gradient and jacobian into the baked maps
pub struct BakePass {
    pub baker: HeightGradientBaker,
    pub height: BufferId,
    pub displacement: BufferId,
    pub height_displacement: ImageId,
    pub gradient_jacobian: ImageId,
}

impl FramePass for BakePass {
    fn name(&self) -> &str {
        "Bake"
    }

    fn is_enabled(&self, frame: &FrameInfo<'_>) -> bool {
        frame.simulate
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()> {
        if context.frame.resynthesize {
            self.baker.set_tile_size(context.frame.config.size);
        }

        let resources = &mut *context.resources;
        let heights = &resources.buffers.get(self.height)?.data;
        let displacement = &resources.buffers.get(self.displacement)?.data;
        let [hd, gj] = resources
            .images
            .get_many_mut([self.height_displacement, self.gradient_jacobian])?;

        let groups = hd.level(0)?.texels.len();
        self.baker
            .bake(heights, displacement, hd.level_mut(0)?, gj.level_mut(0)?)?;
        context.commands.dispatch("bake", groups);
        Ok(())
    }
}

/// Rebuilds the mip chain of one output image from level 0
pub struct MipPass {
    pub name: &'static str,
    pub generator: MipGenerator,
    pub image: ImageId,
    pub compute: bool,
}

impl FramePass for MipPass {
    fn name(&self) -> &str {
        self.name
    }

    fn is_compute_pass(&self) -> bool {
        self.compute
    }

    fn is_enabled(&self, frame: &FrameInfo<'_>) -> bool {
        frame.simulate
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()> {
        let texture = context.resources.images.get_mut(self.image)?;
        self.generator.generate(texture, 0, context.commands)?;
        Ok(())
    }
}

/// Copies the spatial normal field into level 0 of the normals image
pub struct CopyNormalsPass {
    pub source: BufferId,
    pub image: ImageId,
}

impl FramePass for CopyNormalsPass {
    fn name(&self) -> &str {
        "CopyNormals"
    }

    fn is_compute_pass(&self) -> bool {
        false
    }

    fn is_enabled(&self, frame: &FrameInfo<'_>) -> bool {
        frame.simulate
    }

    fn record_into(&mut self, context: &mut RecordContext<'_>) -> Result<()> {
        let resources = &mut *context.resources;
        let source = resources.buffers.get(self.source)?;
        let texture = resources.images.get_mut(self.image)?;
        let label = texture.label().to_string();
        let level = texture.level_mut(0)?;

        if level.texels.len() != source.data.len() {
            return Err(crate::error::ResourceError::SizeMismatch {
                label,
                expected: level.texels.len(),
                actual: source.data.len(),
            }
            .into());
        }
        for (texel, value) in level.texels.iter_mut().zip(&source.data) {
            *texel = slope_texel(*value);
        }

        let commands = &mut *context.commands;
        commands.transition(&label, 0, ImageLayout::ShaderRead, ImageLayout::TransferDst);
        commands.push(Command::Copy {
            from: source.label().to_string(),
            to: label.clone(),
        });
        commands.transition(&label, 0, ImageLayout::TransferDst, ImageLayout::ShaderRead);
        Ok(())
    }
}

/// Slope field packs x in the real part and y in the imaginary part
fn slope_texel(value: Complex32) -> Vec4 {
    Vec4::new(value.re, value.im, 0.0, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::BakedTexturePair;
    use crate::graph::{FrameGraph, Resources};
    use crate::spectrum::GridExtent;
    use crate::texture::{Texture, TextureFormat};
    use glam::UVec2;

    fn frame(config: &OceanFftConfig) -> FrameInfo<'_> {
        FrameInfo {
            time: 1.0,
            resynthesize: false,
            simulate: true,
            config,
        }
    }

    #[test]
    fn test_transient_transform_keeps_last_frame() {
        let config = OceanFftConfig::default();
        let extent = GridExtent::square(4);
        let mut resources = Resources::new();
        // Sized for a different grid than the engine was planned for
        let frequency = resources.create_buffer("HeightFrequency", GridExtent::square(2));
        let results = [
            resources.create_buffer("HeightResult0", extent),
            resources.create_buffer("HeightResult1", extent),
        ];
        let displacement = resources.create_buffer("DisplacementResult0", extent);
        resources.buffers.get_mut(results[0]).unwrap().data.fill(Complex32::new(7.0, 0.0));
        let baked = BakedTexturePair::new(extent);
        let hd = resources.create_image(baked.height_displacement);
        let gj = resources.create_image(baked.gradient_jacobian);

        let mut graph = FrameGraph::new();
        let transform = graph.add_pass(Box::new(TransformPass {
            kind: FieldKind::Height,
            engine: SpectralTransformEngine::new(extent).unwrap(),
            frequency,
            results,
        }));
        graph.add_input_storage_buffer(transform, frequency, 0, 0, 0).unwrap();
        graph.add_output_storage_buffer(transform, results[0], 1, 0, 0).unwrap();
        graph.add_output_storage_buffer(transform, results[1], 2, 0, 0).unwrap();

        let bake = graph.add_pass(Box::new(BakePass {
            baker: HeightGradientBaker::new(extent, 0, config.size),
            height: results[0],
            displacement,
            height_displacement: hd,
            gradient_jacobian: gj,
        }));
        graph.add_dependency(bake, transform).unwrap();
        graph.add_input_storage_buffer(bake, results[0], 0, 0, 0).unwrap();
        graph.add_input_storage_buffer(bake, displacement, 1, 0, 0).unwrap();
        graph.add_output_storage_view(bake, hd, 2).unwrap();
        graph.add_output_storage_view(bake, gj, 3).unwrap();
        graph.compile(&resources).unwrap();

        let commands = graph.execute(&mut resources, &frame(&config)).unwrap();

        assert_eq!(commands.pass_names(), vec!["Transform#0", "Bake#0"]);
        let dispatched = |name: &str| {
            commands
                .commands()
                .iter()
                .any(|c| matches!(c, Command::Dispatch { kernel, .. } if *kernel == name))
        };
        assert!(!dispatched("fft"));
        assert!(dispatched("bake"));

        assert!(resources
            .buffers
            .get(results[0])
            .unwrap()
            .data
            .iter()
            .all(|c| *c == Complex32::new(7.0, 0.0)));
        let level = resources.images.get(hd).unwrap().level(0).unwrap();
        assert!(level.texels.iter().all(|t| t.x == 7.0));
    }

    #[test]
    fn test_copy_normals_goes_through_transfer_layout() {
        let config = OceanFftConfig::default();
        let extent = GridExtent::square(4);
        let mut resources = Resources::new();
        let source = resources.create_buffer("NormalResult0", extent);
        resources.buffers.get_mut(source).unwrap().data.fill(Complex32::new(1.0, 2.0));
        let size = UVec2::splat(4);
        let image = resources.create_image(Texture::new(
            "Normals",
            TextureFormat::Rg16Float,
            size,
            Texture::full_mip_count(size),
        ));

        let mut graph = FrameGraph::new();
        let copy = graph.add_pass(Box::new(CopyNormalsPass { source, image }));
        graph.add_transfer_input_buffer(copy, source).unwrap();
        graph.add_transfer_output_view(copy, image).unwrap();
        graph.compile(&resources).unwrap();

        let commands = graph.execute(&mut resources, &frame(&config)).unwrap();
        assert_eq!(
            &commands.commands()[1..],
            &[
                Command::ImageTransition {
                    image: "Normals".into(),
                    level: 0,
                    from: ImageLayout::ShaderRead,
                    to: ImageLayout::TransferDst,
                },
                Command::Copy {
                    from: "NormalResult0".into(),
                    to: "Normals".into(),
                },
                Command::ImageTransition {
                    image: "Normals".into(),
                    level: 0,
                    from: ImageLayout::TransferDst,
                    to: ImageLayout::ShaderRead,
                },
            ]
        );
        let texel = resources.images.get(image).unwrap().level(0).unwrap().texels[5];
        assert_eq!(texel, Vec4::new(1.0, 2.0, 0.0, 0.0));
    }

    #[test]
    fn test_normal_spectrum_carries_detail_scale() {
        let config = OceanFftConfig {
            amplitude: 2.0,
            ..Default::default()
        };
        let height = spectrum_params(&config, FieldKind::Height);
        let normal = spectrum_params(&config, FieldKind::Normal);

        assert_eq!(height.amplitude, 2.0);
        assert!((normal.amplitude - 2.0 * NORMAL_DETAIL_SCALE).abs() < 1e-6);
        assert_eq!(normal.tile_size, config.normal_tile_size());
    }
}
