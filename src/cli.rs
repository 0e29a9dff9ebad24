//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::error::ConfigError;
use crate::params::{CaptureConfig, OceanFftConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "fft-ocean")]
#[command(about = "Headless FFT ocean simulation", long_about = None)]
pub struct Args {
    /// Ocean configuration (JSON); defaults are used when the file is missing
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of frames to simulate
    #[arg(long, value_name = "COUNT", default_value = "120")]
    pub frames: usize,

    /// Simulated frame rate
    #[arg(long, value_name = "HZ", default_value = "60")]
    pub fps: f32,

    /// Use the fixed seed so runs are reproducible
    #[arg(long)]
    pub seeded: bool,

    /// Dump the baked maps as PNG into this directory
    #[arg(long, value_name = "DIR")]
    pub capture: Option<PathBuf>,

    /// Capture every Nth frame
    #[arg(long, value_name = "N", default_value = "1")]
    pub every: usize,

    /// Also upload the outputs to a headless GPU device
    #[arg(long)]
    pub gpu: bool,
}

impl Args {
    /// Load the ocean configuration, applying command-line overrides
    pub fn load_config(&self) -> Result<OceanFftConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => OceanFftConfig::load_or_default(path),
            None => OceanFftConfig::default(),
        };
        if self.seeded {
            config.disable_random_seed = true;
        }
        config.validate()?;
        Ok(config)
    }

    /// Create capture configuration if capture mode is enabled
    pub fn capture_config(&self) -> Option<CaptureConfig> {
        self.capture.as_ref().map(|dir| {
            let mut config = CaptureConfig::new(dir);
            config.every = self.every.max(1);
            config
        })
    }

    /// Seconds advanced per frame
    pub fn frame_delta(&self) -> f32 {
        if self.fps > 0.0 {
            1.0 / self.fps
        } else {
            0.0
        }
    }
}
