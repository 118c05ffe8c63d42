use super::{gaussian, normalize, Descriptor, SampleFrame};
use crate::evolution::EvolutionLevel;
use crate::KeyPoint;

/// Samples per side of a subregion.
const SAMPLE_STEP: i32 = 5;
/// Half the side of the described square, in samples.
const PATTERN_SIZE: i32 = 10;
/// Sigma of the weighting Gaussian, in samples.
const WEIGHT_SIGMA: f32 = 3.3;

/// The 64 dimensional SURF descriptor.
///
/// A 20x20 grid of samples is split into 4x4 subregions of 5x5 samples.
/// Each subregion contributes the sums of the gradient along and across the
/// keypoint direction and of their absolute values, weighted by a Gaussian
/// centered on the keypoint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Surf {
    pub upright: bool,
}

impl Descriptor for Surf {
    type Output = [f32; 64];

    fn describe(&self, keypoint: &KeyPoint, level: &EvolutionLevel) -> [f32; 64] {
        let frame = SampleFrame::new(keypoint, level, self.upright);
        let mut descriptor = [0f32; 64];
        let mut dcount = 0;
        for i in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
            for j in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
                let mut sums = [0f32; 4];
                for k in i..i + SAMPLE_STEP {
                    for l in j..j + SAMPLE_STEP {
                        let u = k as f32 + 0.5;
                        let v = l as f32 + 0.5;
                        let weight = gaussian(u, v, WEIGHT_SIGMA);
                        let (gu, gv) = frame.gradient_bilinear(u, v);
                        sums[0] += weight * gu;
                        sums[1] += weight * gv;
                        sums[2] += weight * gu.abs();
                        sums[3] += weight * gv.abs();
                    }
                }
                descriptor[dcount..dcount + 4].copy_from_slice(&sums);
                dcount += 4;
            }
        }
        normalize(&mut descriptor);
        descriptor
    }
}
