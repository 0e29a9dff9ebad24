//! 2D inverse FFT over complex buffers, backed by rustfft.
//!
//! One engine exists per field. The transform runs rows first, then
//! transposes into the field's second result buffer to run the columns,
//! and transposes back, so the consumer only ever reads result buffer 0.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::error::FftError;
use crate::spectrum::GridExtent;

/// Planned inverse transform for a fixed extent
pub struct SpectralTransformEngine {
    extent: GridExtent,
    rows: Arc<dyn Fft<f32>>,
    columns: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl SpectralTransformEngine {
    /// Plan transforms for `extent`.
    ///
    /// Non power-of-two or empty extents are a fatal initialisation error.
    pub fn new(extent: GridExtent) -> Result<Self, FftError> {
        if extent.is_empty() || !extent.is_power_of_two() {
            return Err(FftError::UnsupportedSize {
                width: extent.width,
                height: extent.height,
            });
        }

        let mut planner = FftPlanner::new();
        let rows = planner.plan_fft_inverse(extent.width as usize);
        let columns = planner.plan_fft_inverse(extent.height as usize);
        let scratch_len = rows
            .get_inplace_scratch_len()
            .max(columns.get_inplace_scratch_len());

        Ok(Self {
            extent,
            rows,
            columns,
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        })
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    /// Inverse-transform `input` into `output` (unnormalised).
    ///
    /// `transpose` is the ping-pong buffer used for the column pass; its
    /// contents afterwards are unspecified. Mismatched buffer sizes are a
    /// transient failure and leave `output` untouched.
    pub fn inverse(
        &mut self,
        input: &[Complex32],
        output: &mut [Complex32],
        transpose: &mut [Complex32],
    ) -> Result<(), FftError> {
        let expected = self.extent.len();
        check_len("input", expected, input.len())?;
        check_len("output", expected, output.len())?;
        check_len("transpose", expected, transpose.len())?;

        let width = self.extent.width as usize;
        let height = self.extent.height as usize;

        output.copy_from_slice(input);
        self.rows.process_with_scratch(output, &mut self.scratch);

        transpose_into(output, transpose, width, height);
        self.columns.process_with_scratch(transpose, &mut self.scratch);
        transpose_into(transpose, output, height, width);

        Ok(())
    }
}

fn check_len(buffer: &'static str, expected: usize, actual: usize) -> Result<(), FftError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FftError::BadLaunchParameters {
            buffer,
            expected,
            actual,
        })
    }
}

/// Transpose a row-major `width`x`height` matrix into `dst` (`height`x`width`)
fn transpose_into(src: &[Complex32], dst: &mut [Complex32], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            dst[x * height + y] = src[y * width + x];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn zeros(len: usize) -> Vec<Complex32> {
        vec![Complex32::new(0.0, 0.0); len]
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(matches!(
            SpectralTransformEngine::new(GridExtent::new(6, 8)),
            Err(FftError::UnsupportedSize { width: 6, height: 8 })
        ));
        assert!(SpectralTransformEngine::new(GridExtent::new(0, 8)).is_err());
    }

    #[test]
    fn test_size_mismatch_is_transient() {
        let mut engine = SpectralTransformEngine::new(GridExtent::square(4)).unwrap();
        let input = zeros(16);
        let mut output = vec![Complex32::new(5.0, 0.0); 16];
        let mut transpose = zeros(8);

        let err = engine.inverse(&input, &mut output, &mut transpose).unwrap_err();
        assert!(err.is_transient());
        // Stale data is kept
        assert!(output.iter().all(|c| c.re == 5.0));
    }

    #[test]
    fn test_dc_bin_is_constant_field() {
        let extent = GridExtent::new(8, 4);
        let mut engine = SpectralTransformEngine::new(extent).unwrap();
        let mut input = zeros(extent.len());
        input[0] = Complex32::new(2.0, 0.0);
        let mut output = zeros(extent.len());
        let mut transpose = zeros(extent.len());

        engine.inverse(&input, &mut output, &mut transpose).unwrap();
        assert!(output
            .iter()
            .all(|c| (c.re - 2.0).abs() < 1e-6 && c.im.abs() < 1e-6));
    }

    #[test]
    fn test_single_frequency_is_cosine_wave() {
        let extent = GridExtent::new(8, 4);
        let mut engine = SpectralTransformEngine::new(extent).unwrap();
        let mut input = zeros(extent.len());
        // Hermitian pair at kx = ±1 gives a real cosine along x
        input[extent.index(1, 0)] = Complex32::new(0.5, 0.0);
        input[extent.index(-1, 0)] = Complex32::new(0.5, 0.0);
        let mut output = zeros(extent.len());
        let mut transpose = zeros(extent.len());

        engine.inverse(&input, &mut output, &mut transpose).unwrap();
        for y in 0..4 {
            for x in 0..8 {
                let value = output[extent.index(x, y)];
                let expected = (TAU * x as f32 / 8.0).cos();
                assert!((value.re - expected).abs() < 1e-5);
                assert!(value.im.abs() < 1e-5);
            }
        }
    }
}
