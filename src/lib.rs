//! FFT ocean - Tessendorf wave synthesis, evolution and baking driven by a frame graph

pub mod bake;
pub mod capture;
pub mod cli;
pub mod error;
pub mod fft;
pub mod graph;
pub mod mip;
pub mod ocean;
pub mod params;
pub mod rendering;
pub mod spectrum;
pub mod texture;

pub use error::{OceanError, Result};
pub use ocean::{FieldKind, OceanFft};
pub use params::OceanFftConfig;
