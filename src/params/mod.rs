//! Parameter definitions with physical units and documented semantics.
//!
//! All tuning values are extracted here with:
//! - Physical units (meters, seconds, m/s)
//! - Documented ranges and meanings
//! - Validation at load time

mod capture;
mod ocean;

// Re-export all types
pub use capture::CaptureConfig;
pub use ocean::{physics_constants, OceanFftConfig};
