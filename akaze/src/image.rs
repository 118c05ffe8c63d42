use derive_more::{Deref, DerefMut};
use image::{DynamicImage, ImageBuffer, Luma};
use log::*;
use ndarray::{azip, s, Array2, ArrayView2, ArrayViewMut2};
use nshare::{MutNdarray2, RefNdarray2};
use std::f32;
use wide::f32x4;

pub type GrayImageBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;

/// The image type we use in this library.
///
/// This is a thin wrapper around a contiguous `f32` buffer from the image
/// crate. Filters work directly on the raw rows instead of going through
/// per-pixel accessors, and the separable filters below use SIMD over the
/// row direction, which is considerably faster than the generic convolutions
/// in imageproc. The image crate is still used for loading images.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct GrayFloatImage(pub GrayImageBuffer);

impl GrayFloatImage {
    /// Create a unit float image from the image crate's DynamicImage type.
    ///
    /// Color images are converted to luma first.
    ///
    /// # Return value
    /// An image with pixel values between 0 and 1.
    pub fn from_dynamic(input_image: &DynamicImage) -> Self {
        let gray = input_image.to_luma16();
        debug!(
            "Converted a {} x {} image to floating point luma",
            gray.width(),
            gray.height()
        );
        Self(ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([f32::from(gray[(x, y)][0]) / 65535f32])
        }))
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        Self(ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            Luma([f(x as usize, y as usize)])
        }))
    }

    pub fn from_array2(arr: Array2<f32>) -> Self {
        let (height, width) = arr.dim();
        let raw = if arr.is_standard_layout() {
            arr.into_raw_vec()
        } else {
            arr.iter().copied().collect()
        };
        Self(
            GrayImageBuffer::from_raw(width as u32, height as u32, raw)
                .expect("raw vector didn't have enough pixels for the image"),
        )
    }

    pub fn ref_array2(&self) -> ArrayView2<f32> {
        self.0.ref_ndarray2()
    }

    pub fn mut_array2(&mut self) -> ArrayViewMut2<f32> {
        self.0.mut_ndarray2()
    }

    pub fn zero_array(&self) -> Array2<f32> {
        Array2::zeros((self.height(), self.width()))
    }

    pub fn width(&self) -> usize {
        self.0.width() as usize
    }

    pub fn height(&self) -> usize {
        self.0.height() as usize
    }

    pub fn new(width: usize, height: usize) -> Self {
        Self(ImageBuffer::from_pixel(
            width as u32,
            height as u32,
            Luma([0.0]),
        ))
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.0.as_raw()[y * self.width() + x]
    }

    pub fn put(&mut self, x: usize, y: usize, pixel_value: f32) {
        let width = self.width();
        let data: &mut [f32] = &mut self.0;
        data[y * width + x] = pixel_value;
    }

    /// Reading with coordinates clamped to the image.
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width() as isize - 1) as usize;
        let y = y.clamp(0, self.height() as isize - 1) as usize;
        self.get(x, y)
    }

    /// Downsample by averaging 2x2 tiles. A trailing odd row or column is dropped.
    pub fn half_size(&self) -> Self {
        let width = self.width() / 2;
        let height = self.height() / 2;
        let mut half = Array2::zeros((height, width));
        azip!((
            out in &mut half,
            window in self.ref_array2().slice(s![..height * 2, ..width * 2]).exact_chunks((2, 2)),
        ) {
            *out = window.sum() * 0.25;
        });
        Self::from_array2(half)
    }

    /// A copy linearly mapped to `[0, 1]`. A constant image maps to zeros.
    pub fn normalized(&self) -> Self {
        let (min, max) = self
            .0
            .as_raw()
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        let mut out = self.clone();
        for v in out.0.iter_mut() {
            *v = if range > 0.0 { (*v - min) / range } else { 0.0 };
        }
        out
    }
}

/// `out[i] += weight * input[i]`, four lanes at a time.
fn accumulate_scaled(out: &mut [f32], input: &[f32], weight: f32) {
    debug_assert_eq!(out.len(), input.len());
    let lanes = out.len() / 4 * 4;
    let weight_simd = f32x4::splat(weight);
    for (out, input) in out[..lanes]
        .chunks_exact_mut(4)
        .zip(input[..lanes].chunks_exact(4))
    {
        let acc = f32x4::new([out[0], out[1], out[2], out[3]]);
        let value = f32x4::new([input[0], input[1], input[2], input[3]]);
        out.copy_from_slice(&value.mul_add(weight_simd, acc).to_array());
    }
    for (out, &input) in out[lanes..].iter_mut().zip(&input[lanes..]) {
        *out += weight * input;
    }
}

/// Correlate every row with `kernel`, replicating the border pixels.
pub fn horizontal_filter(image: &GrayImageBuffer, kernel: &[f32]) -> GrayImageBuffer {
    let kernel_size = kernel.len();
    debug_assert!(kernel_size % 2 == 1);
    let half = kernel_size / 2;
    let width = image.width() as usize;
    let height = image.height() as usize;
    let mut output = vec![0.0; width * height];
    let mut padded = vec![0f32; width + 2 * half];
    for (row_in, row_out) in image
        .as_raw()
        .chunks_exact(width)
        .zip(output.chunks_exact_mut(width))
    {
        padded[..half].fill(row_in[0]);
        padded[half..half + width].copy_from_slice(row_in);
        padded[half + width..].fill(row_in[width - 1]);
        for (k, &weight) in kernel.iter().enumerate() {
            accumulate_scaled(row_out, &padded[k..k + width], weight);
        }
    }
    GrayImageBuffer::from_raw(width as u32, height as u32, output)
        .expect("filter output has the input dimensions")
}

/// Correlate every column with `kernel`, replicating the border pixels.
///
/// Whole rows are accumulated at once so memory is always read along rows.
pub fn vertical_filter(image: &GrayImageBuffer, kernel: &[f32]) -> GrayImageBuffer {
    let kernel_size = kernel.len();
    debug_assert!(kernel_size % 2 == 1);
    let half = kernel_size / 2;
    let width = image.width() as usize;
    let height = image.height() as usize;
    let input = image.as_raw();
    let mut output = vec![0.0; width * height];
    for (y, row_out) in output.chunks_exact_mut(width).enumerate() {
        for (k, &weight) in kernel.iter().enumerate() {
            let source_y = (y + k).saturating_sub(half).min(height - 1);
            let row_in = &input[source_y * width..(source_y + 1) * width];
            accumulate_scaled(row_out, row_in, weight);
        }
    }
    GrayImageBuffer::from_raw(width as u32, height as u32, output)
        .expect("filter output has the input dimensions")
}

pub fn separable_filter(
    image: &GrayImageBuffer,
    h_kernel: &[f32],
    v_kernel: &[f32],
) -> GrayImageBuffer {
    let h = horizontal_filter(image, h_kernel);
    vertical_filter(&h, v_kernel)
}

/// The Gaussian function.
///
/// # Arguments
/// * `x` - the offset.
/// * `r` - sigma.
/// # Return value
/// The kernel value at x.
fn gaussian(x: f32, r: f32) -> f32 {
    ((2.0 * f32::consts::PI).sqrt() * r).recip() * (-x.powi(2) / (2.0 * r.powi(2))).exp()
}

/// Generate a normalized Gaussian kernel.
///
/// # Arguments
/// * `r` - sigma.
/// * `kernel_size` - The size of the kernel, must be odd.
pub fn gaussian_kernel(r: f32, kernel_size: usize) -> Vec<f32> {
    assert!(kernel_size % 2 == 1, "kernel_size must be odd");
    let half_width = (kernel_size / 2) as i32;
    let mut kernel: Vec<f32> = (-half_width..=half_width)
        .map(|i| gaussian(i as f32, r))
        .collect();
    let sum: f32 = kernel.iter().sum();
    for val in kernel.iter_mut() {
        *val /= sum;
    }
    kernel
}

/// Size of the kernel [`gaussian_blur`] uses for a given sigma.
pub fn gaussian_kernel_size(r: f32) -> usize {
    let kernel_radius = (2.0 * r).ceil() as usize;
    kernel_radius * 2 + 1
}

/// Perform Gaussian blur on an image.
///
/// # Arguments
/// * `r` - sigma.
/// # Return value
/// The resulting image after the filter was applied.
pub fn gaussian_blur(image: &GrayFloatImage, r: f32) -> GrayFloatImage {
    assert!(r > 0.0, "sigma must be > 0.0");
    let kernel = gaussian_kernel(r, gaussian_kernel_size(r));
    GrayFloatImage(separable_filter(image, &kernel, &kernel))
}
