//! Headless capture configuration.

use std::path::PathBuf;

/// Capture mode configuration (PNG dumps of the baked maps)
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Output directory for frames
    pub output_dir: PathBuf,

    /// Write every Nth simulated frame
    pub every: usize,
}

impl CaptureConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            every: 1,
        }
    }

    /// Whether the given frame should be written
    pub fn captures(&self, frame: usize) -> bool {
        self.every > 0 && frame % self.every == 0
    }

    /// Frame file path for one of the baked maps
    pub fn frame_path(&self, map: &str, frame: usize) -> PathBuf {
        self.output_dir.join(format!("{}_{:05}.png", map, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_paths() {
        let mut config = CaptureConfig::new("capture");
        config.every = 4;

        assert!(config.captures(0));
        assert!(!config.captures(3));
        assert!(config.captures(8));
        assert_eq!(
            config.frame_path("height", 12),
            PathBuf::from("capture/height_00012.png")
        );
    }
}
