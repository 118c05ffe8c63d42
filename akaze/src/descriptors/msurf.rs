use super::{gaussian, normalize, Descriptor, SampleFrame};
use crate::evolution::EvolutionLevel;
use crate::KeyPoint;

/// First sample of each of the 4 subregions along an axis. Subregions are
/// 9 samples wide and overlap their neighbors by 4.
const SUBREGION_STARTS: [i32; 4] = [-12, -7, -2, 3];
const SUBREGION_SIZE: i32 = 9;

/// The 64 dimensional M-SURF descriptor.
///
/// Like SURF, but the 4x4 subregions overlap, every sample is weighted by a
/// Gaussian centered on its subregion and every subregion by a Gaussian
/// centered on the keypoint, which removes boundary effects.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Msurf {
    pub upright: bool,
}

impl Descriptor for Msurf {
    type Output = [f32; 64];

    fn describe(&self, keypoint: &KeyPoint, level: &EvolutionLevel) -> [f32; 64] {
        let frame = SampleFrame::new(keypoint, level, self.upright);
        let mut descriptor = [0f32; 64];
        let mut dcount = 0;
        for (cx, &i) in SUBREGION_STARTS.iter().enumerate() {
            for (cy, &j) in SUBREGION_STARTS.iter().enumerate() {
                let center_u = (i + SUBREGION_SIZE / 2) as f32;
                let center_v = (j + SUBREGION_SIZE / 2) as f32;
                let mut sums = [0f32; 4];
                for k in i..i + SUBREGION_SIZE {
                    for l in j..j + SUBREGION_SIZE {
                        let weight = gaussian(k as f32 - center_u, l as f32 - center_v, 2.5);
                        let (gu, gv) = frame.gradient_bilinear(k as f32, l as f32);
                        sums[0] += weight * gu;
                        sums[1] += weight * gv;
                        sums[2] += weight * gu.abs();
                        sums[3] += weight * gv.abs();
                    }
                }
                let subregion_weight = gaussian(cx as f32 - 1.5, cy as f32 - 1.5, 1.5);
                for (out, sum) in descriptor[dcount..dcount + 4].iter_mut().zip(sums) {
                    *out = sum * subregion_weight;
                }
                dcount += 4;
            }
        }
        normalize(&mut descriptor);
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::plan_levels;
    use crate::image::GrayFloatImage;
    use crate::Config;

    fn keypoint(angle: f32) -> KeyPoint {
        KeyPoint {
            point: (48.0, 48.0),
            response: 1.0,
            size: 4.0,
            octave: 0,
            level: 0,
            angle,
        }
    }

    #[test]
    fn unit_norm_and_symmetric_weights() {
        let mut level = EvolutionLevel::new(plan_levels(&Config::new(96, 96))[0]);
        level.Lx = GrayFloatImage::from_fn(96, 96, |_, _| 1.0);
        level.Ly = GrayFloatImage::new(96, 96);
        let descriptor = Msurf { upright: true }.describe(&keypoint(0.0), &level);
        let norm: f32 = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        // Inner subregions outweigh the corners, mirrored ones are equal.
        let first = |cx: usize, cy: usize| descriptor[(cx * 4 + cy) * 4];
        assert!(first(1, 1) > first(0, 0));
        assert!((first(0, 0) - first(3, 3)).abs() < 1e-6);
        assert!((first(1, 2) - first(2, 1)).abs() < 1e-6);
    }

    #[test]
    fn rotated_frame_follows_the_gradient() {
        let angle = 2.0f32;
        let mut level = EvolutionLevel::new(plan_levels(&Config::new(96, 96))[0]);
        level.Lx = GrayFloatImage::from_fn(96, 96, |_, _| angle.cos());
        level.Ly = GrayFloatImage::from_fn(96, 96, |_, _| angle.sin());
        let descriptor = Msurf { upright: false }.describe(&keypoint(angle), &level);
        for cell in descriptor.chunks_exact(4) {
            assert!(cell[0] > 0.0);
            assert!(cell[1].abs() < 1e-5);
        }
    }
}
