use crate::{derivatives, evolution::EvolutionLevel, image::GrayFloatImage};
use ndarray::azip;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Compute the derivatives and the detector response of every level.
///
/// Each level only reads its own smoothed image, so levels are independent.
pub(crate) fn detector_response(evolutions: &mut [EvolutionLevel]) {
    #[cfg(not(feature = "rayon"))]
    for evolution in evolutions.iter_mut() {
        level_response(evolution);
    }
    #[cfg(feature = "rayon")]
    evolutions.par_iter_mut().for_each(level_response);
}

/// Derivatives at the level's scale followed by the scale normalized
/// determinant of the Hessian, `sigma^4 (Lxx Lyy - Lxy^2)`.
#[allow(non_snake_case, clippy::suspicious_operation_groupings)]
fn level_response(evolution: &mut EvolutionLevel) {
    let sigma_size = evolution.geometry.sigma_size;
    compute_multiscale_derivatives(evolution, sigma_size);
    let sigma_size_quat = (sigma_size as f32).powi(4);
    let mut Ldet = evolution.Lxx.zero_array();
    azip!((
        Ldet in &mut Ldet,
        &Lxx in evolution.Lxx.ref_array2(),
        &Lyy in evolution.Lyy.ref_array2(),
        &Lxy in evolution.Lxy.ref_array2(),
    ) {
        *Ldet = (Lxx * Lyy - Lxy * Lxy) * sigma_size_quat;
    });
    evolution.Ldet = GrayFloatImage::from_array2(Ldet);
}

fn compute_multiscale_derivatives(evolution: &mut EvolutionLevel, sigma_size: u32) {
    #[cfg(not(feature = "rayon"))]
    {
        evolution.Lx = derivatives::scharr_horizontal(&evolution.Lsmooth, sigma_size);
        evolution.Ly = derivatives::scharr_vertical(&evolution.Lsmooth, sigma_size);
        evolution.Lxx = derivatives::scharr_horizontal(&evolution.Lx, sigma_size);
        evolution.Lyy = derivatives::scharr_vertical(&evolution.Ly, sigma_size);
        evolution.Lxy = derivatives::scharr_vertical(&evolution.Lx, sigma_size);
    }
    #[cfg(feature = "rayon")]
    {
        (evolution.Lx, evolution.Ly) = rayon::join(
            || derivatives::scharr_horizontal(&evolution.Lsmooth, sigma_size),
            || derivatives::scharr_vertical(&evolution.Lsmooth, sigma_size),
        );
        (evolution.Lxx, (evolution.Lyy, evolution.Lxy)) = rayon::join(
            || derivatives::scharr_horizontal(&evolution.Lx, sigma_size),
            || {
                rayon::join(
                    || derivatives::scharr_vertical(&evolution.Ly, sigma_size),
                    || derivatives::scharr_vertical(&evolution.Lx, sigma_size),
                )
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::plan_levels;
    use crate::Config;

    #[test]
    fn blob_center_has_positive_response() {
        let geometry = plan_levels(&Config::new(64, 64))[2];
        let mut level = EvolutionLevel::new(geometry);
        level.Lsmooth = GrayFloatImage::from_fn(64, 64, |x, y| {
            let dx = x as f32 - 32.0;
            let dy = y as f32 - 32.0;
            (-(dx * dx + dy * dy) / 18.0).exp()
        });
        level_response(&mut level);
        assert!(level.Ldet.get(32, 32) > 0.0);
        // Saddle-like ring around the blob.
        assert!(level.Ldet.get(32, 32) > level.Ldet.get(38, 32));
        assert!(level.Lx.get(32, 32).abs() < 1e-5);
        assert!(level.Lx.get(30, 32) > 0.0);
    }

    #[test]
    fn linear_ramp_has_no_response() {
        let geometry = plan_levels(&Config::new(32, 32))[0];
        let mut level = EvolutionLevel::new(geometry);
        level.Lsmooth = GrayFloatImage::from_fn(32, 32, |x, y| 0.01 * x as f32 + 0.02 * y as f32);
        detector_response(std::slice::from_mut(&mut level));
        assert!(level.Ldet.get(16, 16).abs() < 1e-8);
    }
}
