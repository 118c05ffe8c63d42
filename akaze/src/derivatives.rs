use crate::image::{separable_filter, GrayFloatImage};

/// Unnormalized 3x3 Scharr derivative in x, like `cv::Scharr` with xorder=1.
///
/// Used for the diffusivity and the contrast factor, which only need
/// gradients relative to each other.
pub fn simple_scharr_horizontal(image: &GrayFloatImage) -> GrayFloatImage {
    GrayFloatImage(separable_filter(&image.0, &[-1., 0., 1.], &[3., 10., 3.]))
}

/// Unnormalized 3x3 Scharr derivative in y, like `cv::Scharr` with yorder=1.
pub fn simple_scharr_vertical(image: &GrayFloatImage) -> GrayFloatImage {
    GrayFloatImage(separable_filter(&image.0, &[3., 10., 3.], &[-1., 0., 1.]))
}

/// Compute the scale-adapted Scharr derivative horizontally.
///
/// The kernel spans `2 * sigma_size + 1` pixels and is normalized, so
/// derivatives of different scales are directly comparable.
///
/// # Arguments
/// * `image` - the input image.
/// * `sigma_size` - the scale of the derivative.
pub fn scharr_horizontal(image: &GrayFloatImage, sigma_size: u32) -> GrayFloatImage {
    let (difference, smoothing) = scharr_kernels(sigma_size);
    GrayFloatImage(separable_filter(&image.0, &difference, &smoothing))
}

/// Compute the scale-adapted Scharr derivative vertically.
pub fn scharr_vertical(image: &GrayFloatImage, sigma_size: u32) -> GrayFloatImage {
    let (difference, smoothing) = scharr_kernels(sigma_size);
    GrayFloatImage(separable_filter(&image.0, &smoothing, &difference))
}

/// The difference and the smoothing half of a separable Scharr kernel.
fn scharr_kernels(sigma_size: u32) -> (Vec<f32>, Vec<f32>) {
    let sigma_size = sigma_size.max(1);
    let ksize = (2 * sigma_size + 1) as usize;
    // Ratio between the center and the side taps of the smoothing kernel.
    let w = 10.0 / 3.0;
    let side = (1.0 / (2.0 * f64::from(sigma_size) * (w + 2.0))) as f32;
    let mut difference = vec![0.0; ksize];
    difference[0] = -1.0;
    difference[ksize - 1] = 1.0;
    let mut smoothing = vec![0.0; ksize];
    smoothing[0] = side;
    smoothing[ksize / 2] = side * w as f32;
    smoothing[ksize - 1] = side;
    (difference, smoothing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(slope_x: f32, slope_y: f32) -> GrayFloatImage {
        GrayFloatImage::from_fn(32, 32, |x, y| slope_x * x as f32 + slope_y * y as f32)
    }

    #[test]
    fn normalized_derivative_of_ramp_is_slope() {
        let image = ramp(0.5, -0.25);
        for sigma_size in 1..4 {
            let lx = scharr_horizontal(&image, sigma_size);
            let ly = scharr_vertical(&image, sigma_size);
            assert!((lx.get(16, 16) - 0.5).abs() < 1e-4, "{}", lx.get(16, 16));
            assert!((ly.get(16, 16) + 0.25).abs() < 1e-4, "{}", ly.get(16, 16));
        }
    }

    #[test]
    fn simple_scharr_is_scaled_by_32() {
        let image = ramp(1.0, 0.0);
        let lx = simple_scharr_horizontal(&image);
        assert!((lx.get(10, 10) - 32.0).abs() < 1e-3);
        let ly = simple_scharr_vertical(&image);
        assert!(ly.get(10, 10).abs() < 1e-3);
    }
}
