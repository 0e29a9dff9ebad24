//! Error types for the ocean simulation.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::Access;

/// Invalid or unusable ocean configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid JSON for the expected shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("heightMapSamples must be a power of two >= 2, got {0}")]
    NotPowerOfTwo(u32),

    #[error("displacementDownsample {shift} leaves no samples for a {samples}-sample heightmap")]
    DownsampleTooLarge { shift: u32, samples: u32 },

    /// A field that must be strictly positive and finite is not
    #[error("{field} must be positive and finite")]
    NonPositive { field: &'static str },

    #[error("windDirection must be a non-zero vector")]
    ZeroWindDirection,

    #[error("amplitude must be finite")]
    NonFiniteAmplitude,

    /// Grids are allocated once, so sample counts cannot change after construction
    #[error("grid resolution cannot change after construction ({field}: {old} -> {new})")]
    ResolutionChanged {
        field: &'static str,
        old: u32,
        new: u32,
    },
}

/// Whether an FFT failure can be ridden out or kills the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftSeverity {
    /// Logged; the field keeps last frame's output
    Transient,
    /// Unrecoverable, raised at construction
    Fatal,
}

/// Failure reported by the spectral transform backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FftError {
    #[error("unsupported transform size {width}x{height}")]
    UnsupportedSize { width: u32, height: u32 },

    #[error("bad launch parameters: {buffer} holds {actual} values, expected {expected}")]
    BadLaunchParameters {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl FftError {
    pub fn severity(&self) -> FftSeverity {
        match self {
            FftError::UnsupportedSize { .. } => FftSeverity::Fatal,
            FftError::BadLaunchParameters { .. } => FftSeverity::Transient,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.severity() == FftSeverity::Transient
    }
}

/// Misuse of the resource arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("{kind} handle {index} does not exist")]
    UnknownHandle { kind: &'static str, index: u32 },

    #[error("{kind} handle {index} borrowed more than once")]
    Aliased { kind: &'static str, index: u32 },

    #[error("{label}: mip level {level} does not exist")]
    MissingMipLevel { label: String, level: u32 },

    #[error("{label}: expected {expected} values, found {actual}")]
    SizeMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },
}

/// Invalid pass graph construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("pass handle {0} does not belong to this graph")]
    UnknownPass(u32),

    #[error("pass '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("dependency cycle through passes: {0:?}")]
    Cycle(Vec<String>),

    /// A reader was declared without an ordering edge to the pass producing its input
    #[error("pass '{reader}' reads {resource} ({access:?}) written by '{writer}' without depending on it")]
    MissingDependency {
        reader: String,
        writer: String,
        resource: String,
        access: Access,
    },

    #[error("graph must be compiled before execution")]
    NotCompiled,
}

/// Failure to set up the GPU upload path.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Failed to find suitable GPU adapter")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Failure writing a captured map to disk.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to create capture directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Texture '{0}' has no levels to capture")]
    EmptyTexture(String),
}

/// Top-level error for the ocean simulation.
#[derive(Error, Debug)]
pub enum OceanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("FFT initialisation failed: {0}")]
    Fft(#[from] FftError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Time steps must be finite; the simulation clock is left untouched
    #[error("time step must be finite, got {0}")]
    NonFiniteTimeStep(f64),
}

pub type Result<T, E = OceanError> = std::result::Result<T, E>;
