//! fft-ocean - headless driver for the FFT ocean
//!
//! Simulates a fixed number of frames, optionally dumping the baked maps
//! and pushing them through the GPU upload path.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;

use fft_ocean::capture::FrameCapture;
use fft_ocean::cli::Args;
use fft_ocean::ocean::{OceanFft, PatchMesh};
use fft_ocean::rendering::{request_headless_device, OceanGpuResources};

/// Camera used for the per-frame uniform block
const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 30.0, 0.0);

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = args.load_config().context("invalid ocean configuration")?;
    log::info!(
        "Ocean: {} samples, {:?} m tile, downsample {}",
        config.height_map_samples,
        config.size,
        config.displacement_downsample
    );

    let mut ocean = OceanFft::new(config).context("failed to build ocean")?;

    let mut capture = args
        .capture_config()
        .map(FrameCapture::new)
        .transpose()?;

    let gpu = if args.gpu {
        let (device, queue) = request_headless_device()?;
        let config = ocean.config();
        let mesh = PatchMesh::new(config.patch_size, config.blocks_count);
        let resources = OceanGpuResources::new(&device, &ocean, &mesh);
        log::info!(
            "GPU upload path ready ({} patches)",
            mesh.patch_count()
        );
        Some((device, queue, resources))
    } else {
        None
    };

    let dt = args.frame_delta();
    let start = Instant::now();
    for frame in 0..args.frames {
        ocean.update(dt)?;

        if let Some(capture) = capture.as_mut() {
            capture.capture(&ocean, frame)?;
        }
        if let Some((device, queue, resources)) = &gpu {
            resources.upload(queue, &ocean, &ocean.ubo(CAMERA_POSITION));
            queue.submit(std::iter::empty());
            let _ = device.poll(wgpu::Maintain::Poll);
        }
    }

    let elapsed = start.elapsed().as_secs_f32();
    log::info!(
        "Simulated {} frames ({:.2} s of ocean time) in {:.2} s, {} passes last frame",
        args.frames,
        ocean.time(),
        elapsed,
        ocean.last_passes().len()
    );
    if let Some(capture) = capture {
        log::info!(
            "Wrote {} captures to {}",
            capture.written(),
            capture.config().output_dir.display()
        );
    }
    Ok(())
}
