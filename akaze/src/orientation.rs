use crate::descriptors::level_coordinates;
use crate::evolution::{EvolutionLevel, ScaleSpace};
use crate::KeyPoint;
use std::f32::consts::PI;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Width of the sliding angular window.
const WINDOW: f32 = PI / 3.0;
/// Angular step of the sliding window.
const WINDOW_STEP: f32 = 0.15;

/// A 7x7 Gaussian kernel.
#[allow(clippy::excessive_precision)]
static GAUSS25: [[f32; 7usize]; 7usize] = [
    [0.0254_6481, 0.0235_0698, 0.0184_9125, 0.0123_9505, 0.0070_8017, 0.0034_4629, 0.0014_2946],
    [0.0235_0698, 0.0216_9968, 0.0170_6957, 0.0114_4208, 0.0065_3582, 0.0031_8132, 0.0013_1956],
    [0.0184_9125, 0.0170_6957, 0.0134_2740, 0.0090_0066, 0.0051_4126, 0.0025_0252, 0.0010_3800],
    [0.0123_9505, 0.0114_4208, 0.0090_0066, 0.0060_3332, 0.0034_4629, 0.0016_7749, 0.0006_9579],
    [0.0070_8017, 0.0065_3582, 0.0051_4126, 0.0034_4629, 0.0019_6855, 0.0009_5820, 0.0003_9744],
    [0.0034_4629, 0.0031_8132, 0.0025_0252, 0.0016_7749, 0.0009_5820, 0.0004_6640, 0.0001_9346],
    [0.0014_2946, 0.0013_1956, 0.0010_3800, 0.0006_9579, 0.0003_9744, 0.0001_9346, 0.0000_8024],
];

/// Angle of the vector `(x, y)` in `[0, 2pi)`.
pub(crate) fn get_angle(x: f32, y: f32) -> f32 {
    let angle = y.atan2(x);
    if angle >= 0.0 {
        angle
    } else {
        let wrapped = angle + 2.0 * PI;
        // Tiny negative angles round up to 2pi.
        if wrapped < 2.0 * PI {
            wrapped
        } else {
            0.0
        }
    }
}

/// Set the angle of every keypoint to its dominant orientation.
pub(crate) fn compute_main_orientations(keypoints: &mut [KeyPoint], scale_space: &ScaleSpace) {
    #[cfg(not(feature = "rayon"))]
    keypoints
        .iter_mut()
        .for_each(|keypoint| keypoint.angle = main_orientation(keypoint, &scale_space[keypoint.level]));
    #[cfg(feature = "rayon")]
    keypoints
        .par_iter_mut()
        .for_each(|keypoint| keypoint.angle = main_orientation(keypoint, &scale_space[keypoint.level]));
}

/// Compute the main orientation of the keypoint.
///
/// Gaussian weighted gradients are sampled on a disc of radius `6 s`, where
/// `s` is half the keypoint size in level pixels. A window of `pi/3` slides
/// around the circle and the direction of the largest summed gradient wins.
/// Without any gradient the angle is zero.
pub(crate) fn main_orientation(keypoint: &KeyPoint, level: &EvolutionLevel) -> f32 {
    const ID: [usize; 13] = [6, 5, 4, 3, 2, 1, 0, 1, 2, 3, 4, 5, 6];
    let ratio = level.ratio();
    let s = f32::round(0.5 * keypoint.size / ratio).max(1.0);
    let (xf, yf) = level_coordinates(keypoint, ratio);

    // Calculate derivatives responses for points within radius of 6*scale
    let mut responses: Vec<(f32, f32, f32)> = Vec::with_capacity(109);
    for i in -6i32..=6 {
        for j in -6i32..=6 {
            if i * i + j * j < 36 {
                let iy = f32::round(yf + j as f32 * s) as isize;
                let ix = f32::round(xf + i as f32 * s) as isize;
                let gweight = GAUSS25[ID[(i + 6) as usize]][ID[(j + 6) as usize]];
                let res_x = gweight * level.Lx.get_clamped(ix, iy);
                let res_y = gweight * level.Ly.get_clamped(ix, iy);
                responses.push((res_x, res_y, get_angle(res_x, res_y)));
            }
        }
    }

    let mut angle = 0.0;
    let mut max = 0.0;
    let mut ang1 = 0.0f32;
    while ang1 < 2.0 * PI {
        let ang2 = if ang1 + WINDOW > 2.0 * PI {
            ang1 + WINDOW - 2.0 * PI
        } else {
            ang1 + WINDOW
        };
        let (sum_x, sum_y) = responses
            .iter()
            .filter(|&&(_, _, ang)| {
                if ang1 < ang2 {
                    ang1 < ang && ang < ang2
                } else {
                    ang < ang2 || ang > ang1
                }
            })
            .fold((0.0f32, 0.0f32), |(sx, sy), &(rx, ry, _)| (sx + rx, sy + ry));
        let val = sum_x * sum_x + sum_y * sum_y;
        if val > max {
            max = val;
            angle = get_angle(sum_x, sum_y);
        }
        ang1 += WINDOW_STEP;
    }
    angle
}
