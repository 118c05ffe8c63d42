use super::pattern::DescriptorPattern;
use super::{sample_nearest, BinaryDescriptor, Descriptor, SampleFrame};
use crate::evolution::EvolutionLevel;
use crate::KeyPoint;

/// The M-LDB binary descriptor.
///
/// Every cell of the pattern is reduced to the mean of up to three channels
/// over its samples: the intensity of the evolution image, then either the
/// gradient magnitude or the gradient in the keypoint frame. The bits are
/// the precomputed cell comparisons of the pattern.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mldb<'a> {
    pub pattern: &'a DescriptorPattern,
    pub upright: bool,
}

impl Descriptor for Mldb<'_> {
    type Output = BinaryDescriptor;

    fn describe(&self, keypoint: &KeyPoint, level: &EvolutionLevel) -> BinaryDescriptor {
        let frame = SampleFrame::new(keypoint, level, self.upright);
        let channels = self.pattern.channels();
        let values: Vec<f32> = self
            .pattern
            .cells()
            .iter()
            .flat_map(|cell| cell_means(&frame, cell.u, cell.v, cell.size, channels))
            .collect();
        let mut descriptor = BinaryDescriptor::zeros(self.pattern.len());
        for (bit, comparison) in self.pattern.comparisons().iter().enumerate() {
            let a = values[comparison.a * channels + comparison.channel];
            let b = values[comparison.b * channels + comparison.channel];
            if a > b {
                descriptor.set(bit, true);
            }
        }
        descriptor
    }
}

/// Mean of every channel over the samples `u..u + size`, `v..v + size`.
fn cell_means(frame: &SampleFrame, u: i32, v: i32, size: i32, channels: usize) -> Vec<f32> {
    let level = frame.level;
    let mut sums = [0f32; 3];
    let mut samples = 0usize;
    for k in u..u + size {
        for l in v..v + size {
            let (x, y) = frame.point(k as f32, l as f32);
            sums[0] += sample_nearest(&level.Lt, x, y);
            if channels > 1 {
                let rx = sample_nearest(&level.Lx, x, y);
                let ry = sample_nearest(&level.Ly, x, y);
                if channels == 2 {
                    sums[1] += f32::sqrt(rx * rx + ry * ry);
                } else {
                    let (gu, gv) = frame.rotate_gradient(rx, ry);
                    sums[1] += gu;
                    sums[2] += gv;
                }
            }
            samples += 1;
        }
    }
    sums[..channels]
        .iter()
        .map(|sum| sum / samples.max(1) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::plan_levels;
    use crate::image::GrayFloatImage;
    use crate::Config;

    fn level() -> EvolutionLevel {
        let mut level = EvolutionLevel::new(plan_levels(&Config::new(96, 96))[1]);
        level.Lt = GrayFloatImage::from_fn(96, 96, |x, y| {
            ((x as f32 * 0.3).sin() + (y as f32 * 0.17).cos()) * 0.5
        });
        level.Lx = GrayFloatImage::from_fn(96, 96, |x, _| (x as f32 * 0.3).cos() * 0.15);
        level.Ly = GrayFloatImage::from_fn(96, 96, |_, y| -(y as f32 * 0.17).sin() * 0.085);
        level
    }

    fn keypoint() -> KeyPoint {
        KeyPoint {
            point: (48.0, 48.0),
            response: 1.0,
            size: 4.0,
            octave: 0,
            level: 1,
            angle: 0.7,
        }
    }

    #[test]
    fn subset_bits_match_full_bits() {
        let level = level();
        let full_pattern = DescriptorPattern::full(10, 3);
        let subset_pattern = DescriptorPattern::subset(10, 3, 160);
        for upright in [true, false] {
            let full = Mldb {
                pattern: &full_pattern,
                upright,
            }
            .describe(&keypoint(), &level);
            let subset = Mldb {
                pattern: &subset_pattern,
                upright,
            }
            .describe(&keypoint(), &level);
            assert_eq!(full.len(), 486);
            assert_eq!(subset.len(), 160);
            for (bit, comparison) in subset_pattern.comparisons().iter().enumerate() {
                assert_eq!(subset.get(bit), full.get(comparison.full_index));
            }
        }
    }

    #[test]
    fn flat_patch_sets_no_bits() {
        let mut level = EvolutionLevel::new(plan_levels(&Config::new(64, 64))[0]);
        level.Lt = GrayFloatImage::from_fn(64, 64, |_, _| 0.5);
        level.Lx = GrayFloatImage::new(64, 64);
        level.Ly = GrayFloatImage::new(64, 64);
        let pattern = DescriptorPattern::full(10, 3);
        let descriptor = Mldb {
            pattern: &pattern,
            upright: false,
        }
        .describe(&keypoint(), &level);
        assert!(descriptor.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn intensity_ramp_orders_cells() {
        let mut level = EvolutionLevel::new(plan_levels(&Config::new(96, 96))[0]);
        level.Lt = GrayFloatImage::from_fn(96, 96, |x, _| x as f32);
        level.Lx = GrayFloatImage::new(96, 96);
        level.Ly = GrayFloatImage::new(96, 96);
        let pattern = DescriptorPattern::full(10, 1);
        let mut upright_keypoint = keypoint();
        upright_keypoint.angle = 0.0;
        let descriptor = Mldb {
            pattern: &pattern,
            upright: true,
        }
        .describe(&upright_keypoint, &level);
        // Cell 0 is left of cell 1 and above cell 2 of the 2x2 grid.
        assert!(!descriptor.get(0));
        assert!(!descriptor.get(1));
        // Cell 1 is right of cell 2.
        assert!(descriptor.get(3));
    }
}
