use crate::evolution::ScaleSpace;
use crate::scale_space_extrema::{map_coordinate, Candidate};
use crate::{Config, KeyPoint};
use cv_core::nalgebra::{Matrix3, Vector3};
use log::*;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Number of relocations tried before a candidate is given up.
const MAX_REFINEMENT_ITERATIONS: usize = 5;

/// Do sub-pixel refinement
///
/// Candidates that do not converge, that are not a maximum of the fitted
/// quadratic or that move out of the scale space are dropped.
///
/// # Arguments
/// * `scale_space` - The non-linear scale space with detector responses.
/// * `candidates` - The scale space extrema.
/// * `config` - Used for the keypoint size.
/// # Return value
/// The resulting keypoints, in candidate order.
pub(crate) fn do_subpixel_refinement(
    scale_space: &ScaleSpace,
    candidates: &[Candidate],
    config: &Config,
) -> Vec<KeyPoint> {
    #[cfg(not(feature = "rayon"))]
    let keypoints: Vec<KeyPoint> = candidates
        .iter()
        .filter_map(|candidate| refine(scale_space, candidate, config))
        .collect();
    #[cfg(feature = "rayon")]
    let keypoints: Vec<KeyPoint> = candidates
        .par_iter()
        .filter_map(|candidate| refine(scale_space, candidate, config))
        .collect();
    debug!(
        "{}/{} remain after subpixel refinement.",
        keypoints.len(),
        candidates.len()
    );
    keypoints
}

/// Response of level `level` at the pixel corresponding to `(x, y)` of
/// level `origin`.
fn response(scale_space: &ScaleSpace, origin: usize, level: usize, x: isize, y: isize) -> f64 {
    let from = scale_space[origin].ratio();
    let to = &scale_space[level];
    let (x, y) = if level == origin || to.ratio() == from {
        (x, y)
    } else {
        (
            map_coordinate(x as usize, from, to.ratio()),
            map_coordinate(y as usize, from, to.ratio()),
        )
    };
    f64::from(to.Ldet.get_clamped(x, y))
}

/// Gradient and Hessian of the response in `(x, y, level)` by central differences.
fn derivatives(scale_space: &ScaleSpace, l: usize, x: isize, y: isize) -> (f64, Vector3<f64>, Matrix3<f64>) {
    let v = |dl: isize, dx: isize, dy: isize| {
        response(scale_space, l, (l as isize + dl) as usize, x + dx, y + dy)
    };
    let center = v(0, 0, 0);
    let gradient = Vector3::new(
        0.5 * (v(0, 1, 0) - v(0, -1, 0)),
        0.5 * (v(0, 0, 1) - v(0, 0, -1)),
        0.5 * (v(1, 0, 0) - v(-1, 0, 0)),
    );
    let dxx = v(0, 1, 0) + v(0, -1, 0) - 2.0 * center;
    let dyy = v(0, 0, 1) + v(0, 0, -1) - 2.0 * center;
    let dss = v(1, 0, 0) + v(-1, 0, 0) - 2.0 * center;
    let dxy = 0.25 * (v(0, 1, 1) + v(0, -1, -1) - v(0, 1, -1) - v(0, -1, 1));
    let dxs = 0.25 * (v(1, 1, 0) + v(-1, -1, 0) - v(1, -1, 0) - v(-1, 1, 0));
    let dys = 0.25 * (v(1, 0, 1) + v(-1, 0, -1) - v(1, 0, -1) - v(-1, 0, 1));
    #[rustfmt::skip]
    let hessian = Matrix3::new(
        dxx, dxy, dxs,
        dxy, dyy, dys,
        dxs, dys, dss,
    );
    (center, gradient, hessian)
}

/// Fit a quadratic to the 3x3x3 neighborhood of the candidate and move to
/// its maximum, relocating to the nearest sample while the maximum lies
/// outside the current cell.
fn refine(scale_space: &ScaleSpace, candidate: &Candidate, config: &Config) -> Option<KeyPoint> {
    let mut l = candidate.level;
    let mut x = candidate.x as isize;
    let mut y = candidate.y as isize;
    for _ in 0..MAX_REFINEMENT_ITERATIONS {
        if l == 0 || l + 1 >= scale_space.len() {
            return None;
        }
        let level = &scale_space[l];
        if x < 1
            || y < 1
            || x + 1 >= level.Ldet.width() as isize
            || y + 1 >= level.Ldet.height() as isize
        {
            return None;
        }
        let (center, gradient, hessian) = derivatives(scale_space, l, x, y);
        let offset = -hessian.lu().solve(&gradient)?;
        if offset.iter().all(|o| o.is_finite() && o.abs() < 0.5) {
            // A maximum needs a negative definite Hessian.
            if (-hessian).cholesky().is_none() {
                return None;
            }
            let ratio = level.ratio();
            let px = (x as f64 + offset.x) as f32;
            let py = (y as f64 + offset.y) as f32;
            let point = (
                px * ratio + 0.5 * (ratio - 1.0),
                py * ratio + 0.5 * (ratio - 1.0),
            );
            let (width, height) = (config.width as f32, config.height as f32);
            if point.0 < 0.0 || point.1 < 0.0 || point.0 >= width || point.1 >= height {
                return None;
            }
            let sublevel_position = (l as f64 + offset.z) / f64::from(config.num_sublevels);
            return Some(KeyPoint {
                point,
                response: (center + 0.5 * gradient.dot(&offset)).abs() as f32,
                size: (config.derivative_factor
                    * config.base_scale_offset
                    * 2.0f64.powf(sublevel_position)) as f32,
                octave: level.octave() as usize,
                level: l,
                angle: 0.0,
            });
        }
        if !offset.iter().all(|o| o.is_finite()) {
            return None;
        }
        let next_l = (l as isize + offset.z.round() as isize).max(0) as usize;
        x += offset.x.round() as isize;
        y += offset.y.round() as isize;
        if next_l != l && next_l < scale_space.len() && x >= 0 && y >= 0 {
            let from = scale_space[l].ratio();
            let to = scale_space[next_l].ratio();
            x = map_coordinate(x as usize, from, to);
            y = map_coordinate(y as usize, from, to);
        }
        l = next_l;
    }
    None
}
