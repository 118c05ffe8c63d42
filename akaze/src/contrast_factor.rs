use crate::derivatives::{simple_scharr_horizontal, simple_scharr_vertical};
use crate::error::BuildError;
use crate::image::{gaussian_blur, GrayFloatImage};
use float_ord::FloatOrd;
use log::*;

/// Contrast factor used when the percentile is never reached.
const FALLBACK_CONTRAST_FACTOR: f64 = 0.03;

/// This function computes a good empirical value for the k contrast factor
/// given an input image, the percentile (0-1), the gradient scale and the
/// number of bins in the histogram.
///
/// Only pixels with a non-zero gradient enter the histogram, and the one pixel
/// border is skipped because its Scharr response is biased by the padding.
///
/// # Arguments
/// * `image` Input image
/// * `percentile` - Percentile of the image gradient histogram (0-1)
/// * `gradient_histogram_scale` - Scale for computing the image gradient histogram
/// * `num_bins` - Number of histogram bins
/// # Return value
/// k contrast factor, or an error if the image has no gradient at all.
pub fn compute_contrast_factor(
    image: &GrayFloatImage,
    percentile: f64,
    gradient_histogram_scale: f64,
    num_bins: usize,
) -> Result<f64, BuildError> {
    if image.width() < 3 || image.height() < 3 {
        return Err(BuildError::DegenerateContrast);
    }
    let gaussian = gaussian_blur(image, gradient_histogram_scale as f32);
    let lx = simple_scharr_horizontal(&gaussian);
    let ly = simple_scharr_vertical(&gaussian);
    let magnitudes: Vec<f64> = (1..gaussian.height() - 1)
        .flat_map(|y| (1..gaussian.width() - 1).map(move |x| (x, y)))
        .map(|(x, y)| (lx.get(x, y).powi(2) as f64 + ly.get(x, y).powi(2) as f64).sqrt())
        .collect();
    let hmax = magnitudes
        .iter()
        .copied()
        .map(FloatOrd)
        .max()
        .map_or(0.0, |FloatOrd(max)| max);
    if hmax <= 0.0 {
        return Err(BuildError::DegenerateContrast);
    }

    let mut histogram = vec![0usize; num_bins];
    let mut num_points = 0usize;
    for &modg in magnitudes.iter().filter(|&&modg| modg != 0.0) {
        let bin = ((num_bins as f64 * (modg / hmax)).floor() as usize).min(num_bins - 1);
        histogram[bin] += 1;
        num_points += 1;
    }

    let threshold = (num_points as f64 * percentile) as usize;
    let mut k = 0usize;
    let mut num_elements = 0usize;
    while num_elements < threshold && k < num_bins {
        num_elements += histogram[k];
        k += 1;
    }
    debug!(
        "hmax: {}, threshold: {}, num_elements: {}",
        hmax, threshold, num_elements
    );
    if num_elements >= threshold {
        Ok(hmax * (k as f64) / (num_bins as f64))
    } else {
        Ok(FALLBACK_CONTRAST_FACTOR)
    }
}
