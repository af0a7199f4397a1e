//! Compression pipeline module.
//!
//! Ties the shared predictor core to the residual mapper and the
//! sample-adaptive entropy coder, and runs the symmetric chain in the
//! other direction for decompression. Traversal is band-sequential:
//! band outermost, then row, then column. Per-band coder statistics and
//! the weight vector are reset at the first pixel of every band, so the
//! decompressor reproduces the compressor's state pixel for pixel.

use std::time::Instant;

use serde::Serialize;

use crate::bitio::{BitSink, BitSource};
use crate::coder::{self, SampleStats};
use crate::error::{HyperspecError, Result};
use crate::metrics::DistortionReport;
use crate::params::ParameterSet;
use crate::predictor::Predictor;
use crate::ImageCube;

/// Result of a compression operation.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionResult {
    /// Uncompressed size in bytes.
    pub original_size: usize,
    /// Compressed size in bytes.
    pub compressed_size: usize,
    /// Compression ratio.
    pub compression_ratio: f64,
    /// Average code stream bits per sample.
    pub bits_per_sample: f64,
    /// Time taken for compression in milliseconds.
    pub compression_time_ms: u64,
    /// Whether compression was lossless.
    pub is_lossless: bool,
}

impl CompressionResult {
    /// Calculate space savings as percentage.
    pub fn space_savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            (1.0 - (self.compressed_size as f64 / self.original_size as f64)) * 100.0
        }
    }
}

/// Compression pipeline for multiband image cubes.
///
/// One pipeline owns one validated parameter set; compressing and
/// decompressing are pure functions of the input and that set.
pub struct CompressionPipeline {
    /// Compression parameters, validated at construction.
    params: ParameterSet,
    /// Whether to round-trip decode after compression and check the
    /// reconstruction against the input.
    verify: bool,
}

impl CompressionPipeline {
    /// Create a pipeline, validating every parameter bound up front.
    pub fn new(params: ParameterSet) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            verify: false,
        })
    }

    /// Enable or disable post-compression verification.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// The pipeline's parameter set.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Compress a cube into a byte-aligned code stream.
    pub fn compress(&self, cube: &ImageCube) -> Result<Vec<u8>> {
        self.compress_with_stats(cube).map(|(bytes, _)| bytes)
    }

    /// Compress a cube, also returning size and timing statistics.
    pub fn compress_with_stats(&self, cube: &ImageCube) -> Result<(Vec<u8>, CompressionResult)> {
        let start = Instant::now();

        if cube.is_empty() {
            return Err(HyperspecError::DimensionMismatch(
                "cannot compress an empty image".into(),
            ));
        }
        cube.validate_range(&self.params)?;

        let mut sink = BitSink::new();
        let mut predictor = Predictor::new(&self.params, cube.rows, cube.cols);

        for z in 0..cube.bands {
            predictor.begin_band(z);
            let mut stats = SampleStats::for_band(&self.params);

            for y in 0..cube.rows {
                for x in 0..cube.cols {
                    let t = y * cube.cols + x;
                    let pred = predictor.predict(y, x);

                    let sample = i64::from(cube.get(z, y, x));
                    let q = predictor.quantize(sample - pred.predicted, t);
                    let bound = predictor.residual_bound(t);
                    let mapped = coder::map_residual(&pred, q, bound, &self.params);

                    if t == 0 {
                        coder::encode_first(&mut sink, mapped, &self.params)?;
                    } else {
                        let k = stats.code_param(&self.params);
                        coder::encode_residual(&mut sink, mapped, k, &self.params)?;
                        stats.update(mapped);
                    }

                    predictor.commit(y, x, &pred, q);
                }
            }
            predictor.end_band();
        }

        let payload_bits = sink.bit_count();
        let bytes = sink.finish(self.params.output_word_size)?;

        let original_size = cube.len() * self.params.sample_byte_width();
        let result = CompressionResult {
            original_size,
            compressed_size: bytes.len(),
            compression_ratio: original_size as f64 / bytes.len() as f64,
            bits_per_sample: payload_bits as f64 / cube.len() as f64,
            compression_time_ms: start.elapsed().as_millis() as u64,
            is_lossless: self.params.is_lossless(),
        };

        log::debug!(
            "compressed {}x{}x{} cube to {} bytes ({:.2}:1, {:.2} bits/sample)",
            cube.bands,
            cube.rows,
            cube.cols,
            result.compressed_size,
            result.compression_ratio,
            result.bits_per_sample
        );

        if self.verify {
            self.verify_round_trip(cube, &bytes)?;
        }

        Ok((bytes, result))
    }

    /// Decompress a code stream produced with the same parameter set and
    /// the given dimensions.
    pub fn decompress(
        &self,
        data: &[u8],
        bands: usize,
        rows: usize,
        cols: usize,
    ) -> Result<ImageCube> {
        if bands == 0 || rows == 0 || cols == 0 {
            return Err(HyperspecError::DimensionMismatch(format!(
                "cannot decompress to empty dimensions {}x{}x{}",
                bands, rows, cols
            )));
        }

        let mut source = BitSource::new(data);
        let mut predictor = Predictor::new(&self.params, rows, cols);
        let mut cube = ImageCube::filled(bands, rows, cols, 0);

        for z in 0..bands {
            predictor.begin_band(z);
            let mut stats = SampleStats::for_band(&self.params);

            for y in 0..rows {
                for x in 0..cols {
                    let t = y * cols + x;
                    let pred = predictor.predict(y, x);
                    let bound = predictor.residual_bound(t);

                    let mapped = if t == 0 {
                        coder::decode_first(&mut source, &self.params)?
                    } else {
                        let k = stats.code_param(&self.params);
                        let mapped = coder::decode_residual(&mut source, k, &self.params)?;
                        stats.update(mapped);
                        mapped
                    };

                    let q = coder::unmap_residual(&pred, mapped, bound, &self.params);
                    let value = predictor.commit(y, x, &pred, q);
                    cube.set(z, y, x, value as i32);
                }
            }
            predictor.end_band();
        }

        Ok(cube)
    }

    /// Decode the just-produced stream and check it against the input:
    /// identity in lossless mode, the configured error bound otherwise.
    fn verify_round_trip(&self, original: &ImageCube, stream: &[u8]) -> Result<()> {
        let decoded = self.decompress(stream, original.bands, original.rows, original.cols)?;
        let report = DistortionReport::between(original, &decoded, &self.params)?;

        if self.params.is_lossless() {
            if !report.is_lossless() {
                return Err(HyperspecError::Verification(format!(
                    "lossless round trip differs in {} samples (max error {})",
                    report.diff_samples, report.max_error
                )));
            }
        } else if !report.within_bound(self.params.max_error) {
            return Err(HyperspecError::Verification(format!(
                "max reconstruction error {} exceeds bound {}",
                report.max_error, self.params.max_error
            )));
        }

        log::debug!("round-trip verification passed: {}", report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn pipeline() -> CompressionPipeline {
        CompressionPipeline::new(ParameterSet::default()).unwrap()
    }

    fn round_trip(pipeline: &CompressionPipeline, cube: &ImageCube) -> ImageCube {
        let stream = pipeline.compress(cube).unwrap();
        pipeline
            .decompress(&stream, cube.bands, cube.rows, cube.cols)
            .unwrap()
    }

    fn random_cube(bands: usize, rows: usize, cols: usize, hi: i32, seed: u64) -> ImageCube {
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = (0..bands * rows * cols)
            .map(|_| rng.gen_range(0..=hi))
            .collect();
        ImageCube::new(bands, rows, cols, samples).unwrap()
    }

    #[test]
    fn test_single_voxel_stream_and_round_trip() {
        let pipeline = pipeline();
        let cube = ImageCube::new(1, 1, 1, vec![0]).unwrap();

        // One 10-bit literal, zero-padded out to whole bytes.
        let stream = pipeline.compress(&cube).unwrap();
        assert_eq!(stream, vec![0x00, 0x00]);

        let decoded = pipeline.decompress(&stream, 1, 1, 1).unwrap();
        assert_eq!(decoded.samples, vec![0]);
    }

    #[test]
    fn test_all_zero_cube_stream_shape() {
        let pipeline = pipeline();
        let cube = ImageCube::filled(3, 3, 3, 0);

        // Per band: a 10-bit zero literal, then eight k = 0 codewords of
        // a single zero bit each. 3 * 18 = 54 bits, padded to 7 bytes.
        let stream = pipeline.compress(&cube).unwrap();
        assert_eq!(stream, vec![0u8; 7]);

        let decoded = pipeline.decompress(&stream, 3, 3, 3).unwrap();
        assert_eq!(decoded, cube);
    }

    #[test]
    fn test_unit_spike_round_trip() {
        let pipeline = pipeline();
        let mut cube = ImageCube::filled(3, 3, 3, 0);
        cube.set(0, 0, 0, 1);

        let stream = pipeline.compress(&cube).unwrap();
        let decoded = pipeline.decompress(&stream, 3, 3, 3).unwrap();
        assert_eq!(decoded, cube);
    }

    #[test]
    fn test_known_cube_round_trip() {
        let pipeline = pipeline();
        #[rustfmt::skip]
        let samples = vec![
            3, 7, 1,  0, 9, 4,  2, 2, 8,
            5, 5, 6,  1, 0, 3,  9, 7, 4,
            8, 2, 0,  6, 6, 1,  3, 5, 9,
        ];
        let cube = ImageCube::new(3, 3, 3, samples).unwrap();
        assert_eq!(round_trip(&pipeline, &cube), cube);
    }

    #[test]
    fn test_random_cube_round_trip() {
        let pipeline = pipeline();
        let cube = random_cube(10, 10, 10, 99, 0xC0FFEE);
        assert_eq!(round_trip(&pipeline, &cube), cube);
    }

    #[test]
    fn test_parameter_sweep_round_trips() {
        let cube = random_cube(10, 10, 10, 99, 0xC0FFEE);

        for prediction_bands in [0u32, 1, 2] {
            for rescale_count_exp in [4u32, 5, 6] {
                for unary_limit in [8u32, 16] {
                    let params = ParameterSet {
                        prediction_bands,
                        rescale_count_exp,
                        unary_limit,
                        ..Default::default()
                    };
                    let pipeline = CompressionPipeline::new(params).unwrap();
                    assert_eq!(
                        round_trip(&pipeline, &cube),
                        cube,
                        "P {} gamma* {} U_max {}",
                        prediction_bands,
                        rescale_count_exp,
                        unary_limit
                    );
                }
            }
        }
    }

    #[test]
    fn test_full_range_samples_round_trip() {
        let pipeline = pipeline();
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<i32> = (0..4 * 6 * 5).map(|_| rng.gen_range(-512..=511)).collect();
        let cube = ImageCube::new(4, 6, 5, samples).unwrap();
        assert_eq!(round_trip(&pipeline, &cube), cube);
    }

    #[test]
    fn test_single_column_image_round_trip() {
        let pipeline = pipeline();
        let cube = random_cube(2, 5, 1, 99, 11);
        assert_eq!(round_trip(&pipeline, &cube), cube);
    }

    #[test]
    fn test_single_pixel_bands_round_trip() {
        // 1x1 bands make every pixel the first of its band: literals
        // only, each predicted from the band before.
        let pipeline = pipeline();
        let cube = ImageCube::new(3, 1, 1, vec![5, -17, 300]).unwrap();
        assert_eq!(round_trip(&pipeline, &cube), cube);
    }

    #[test]
    fn test_single_row_image_round_trip() {
        let pipeline = pipeline();
        let cube = random_cube(2, 1, 6, 99, 12);
        assert_eq!(round_trip(&pipeline, &cube), cube);
    }

    #[test]
    fn test_determinism() {
        let pipeline = pipeline();
        let cube = random_cube(4, 5, 5, 500, 99);
        assert_eq!(
            pipeline.compress(&cube).unwrap(),
            pipeline.compress(&cube).unwrap()
        );
    }

    #[test]
    fn test_near_lossless_bounded_distortion() {
        let cube = random_cube(4, 8, 8, 511, 42);

        for max_error in [1u32, 3, 7] {
            let params = ParameterSet::near_lossless(10, max_error);
            let pipeline = CompressionPipeline::new(params).unwrap();
            let stream = pipeline.compress(&cube).unwrap();
            let decoded = pipeline.decompress(&stream, 4, 8, 8).unwrap();

            let worst = cube
                .samples
                .iter()
                .zip(&decoded.samples)
                .map(|(&a, &b)| (i64::from(a) - i64::from(b)).unsigned_abs())
                .max()
                .unwrap();
            assert!(
                worst <= u64::from(max_error),
                "max error {} exceeds bound {}",
                worst,
                max_error
            );
        }
    }

    #[test]
    fn test_near_lossless_with_damping_and_offset() {
        let cube = random_cube(3, 6, 6, 511, 17);
        let params = ParameterSet {
            max_error: 2,
            representative_resolution: 4,
            damping: 3,
            offset: 2,
            ..Default::default()
        };
        let pipeline = CompressionPipeline::new(params).unwrap().verify(true);

        // Verification enforces the error bound internally.
        let (_, result) = pipeline.compress_with_stats(&cube).unwrap();
        assert!(!result.is_lossless);
    }

    #[test]
    fn test_verify_accepts_lossless_round_trip() {
        let pipeline = pipeline().verify(true);
        let cube = random_cube(3, 4, 4, 99, 5);
        assert!(pipeline.compress(&cube).is_ok());
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let pipeline = pipeline();
        let cube = random_cube(10, 10, 10, 99, 0xC0FFEE);
        let stream = pipeline.compress(&cube).unwrap();

        let truncated = &stream[..stream.len() / 2];
        assert!(matches!(
            pipeline.decompress(truncated, 10, 10, 10),
            Err(HyperspecError::TruncatedStream(_))
        ));
    }

    #[test]
    fn test_corrupt_stream_oversized_unary() {
        let pipeline = pipeline();
        // All-ones input: the first codeword after the band literal is an
        // unterminated unary run.
        let data = vec![0xFFu8; 16];
        assert!(matches!(
            pipeline.decompress(&data, 1, 3, 3),
            Err(HyperspecError::OversizedUnary(_))
        ));
    }

    #[test]
    fn test_out_of_range_sample_is_rejected() {
        let pipeline = pipeline();
        let cube = ImageCube::new(1, 1, 2, vec![0, 600]).unwrap();
        assert!(matches!(
            pipeline.compress(&cube),
            Err(HyperspecError::SampleOutOfRange(_))
        ));
    }

    #[test]
    fn test_empty_dimensions_are_rejected() {
        let pipeline = pipeline();
        let cube = ImageCube::new(0, 3, 3, vec![]).unwrap();
        assert!(matches!(
            pipeline.compress(&cube),
            Err(HyperspecError::DimensionMismatch(_))
        ));
        assert!(matches!(
            pipeline.decompress(&[], 0, 3, 3),
            Err(HyperspecError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_invalid_parameters_rejected_at_construction() {
        let params = ParameterSet {
            dynamic_range: 1,
            ..Default::default()
        };
        assert!(matches!(
            CompressionPipeline::new(params),
            Err(HyperspecError::ParameterOutOfRange(_))
        ));
    }

    #[test]
    fn test_compression_result_statistics() {
        let pipeline = pipeline();
        let cube = ImageCube::filled(3, 3, 3, 0);
        let (stream, result) = pipeline.compress_with_stats(&cube).unwrap();

        assert_eq!(result.compressed_size, stream.len());
        assert_eq!(result.original_size, 27 * 2);
        assert!(result.is_lossless);
        assert!(result.compression_ratio > 1.0);
        assert!((result.bits_per_sample - 2.0).abs() < 0.001);
        assert!(result.space_savings_percent() > 0.0);
    }
}
