//! Keypoint descriptors.
//!
//! Every descriptor family samples the keypoint's evolution level in a frame
//! centered on the keypoint, scaled by its size and, unless upright, rotated
//! by its orientation. Samples falling outside the level are clamped to it,
//! so every keypoint gets a descriptor.

pub(crate) mod mldb;
pub(crate) mod msurf;
pub mod pattern;
pub(crate) mod surf;

use crate::evolution::{EvolutionLevel, ScaleSpace};
use crate::image::GrayFloatImage;
use crate::KeyPoint;
use bitarray::BitArray;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Computes one fixed length descriptor from a keypoint and the level it
/// was detected in.
pub(crate) trait Descriptor: Sync {
    type Output: Send;

    fn describe(&self, keypoint: &KeyPoint, level: &EvolutionLevel) -> Self::Output;
}

/// Describe every keypoint, in order.
pub(crate) fn describe_all<D: Descriptor>(
    descriptor: &D,
    keypoints: &[KeyPoint],
    scale_space: &ScaleSpace,
) -> Vec<D::Output> {
    #[cfg(not(feature = "rayon"))]
    {
        keypoints
            .iter()
            .map(|keypoint| descriptor.describe(keypoint, &scale_space[keypoint.level]))
            .collect()
    }
    #[cfg(feature = "rayon")]
    {
        keypoints
            .par_iter()
            .map(|keypoint| descriptor.describe(keypoint, &scale_space[keypoint.level]))
            .collect()
    }
}

/// The descriptors of a set of keypoints, parallel to the keypoints.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptors {
    /// SURF and M-SURF descriptors, L2 normalized.
    Float(Vec<[f32; 64]>),
    /// M-LDB descriptors.
    Binary(Vec<BinaryDescriptor>),
}

impl Descriptors {
    pub fn len(&self) -> usize {
        match self {
            Descriptors::Float(descriptors) => descriptors.len(),
            Descriptors::Binary(descriptors) => descriptors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_float(&self) -> Option<&[[f32; 64]]> {
        match self {
            Descriptors::Float(descriptors) => Some(descriptors),
            Descriptors::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[BinaryDescriptor]> {
        match self {
            Descriptors::Binary(descriptors) => Some(descriptors),
            Descriptors::Float(_) => None,
        }
    }
}

/// An M-LDB descriptor of up to 512 bits.
///
/// Bit `i` is bit `i % 8` of byte `i / 8`. Bits past [`BinaryDescriptor::len`]
/// are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryDescriptor {
    bits: BitArray<64>,
    len: usize,
}

impl BinaryDescriptor {
    /// Largest supported length in bits.
    pub const CAPACITY: usize = 512;

    pub(crate) fn zeros(len: usize) -> Self {
        debug_assert!(len <= Self::CAPACITY);
        Self {
            bits: BitArray::zeros(),
            len,
        }
    }

    pub(crate) fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.len);
        let mask = 1u8 << (index & 7);
        let byte = &mut self.bits.bytes_mut()[index >> 3];
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.bits.bytes()[index >> 3] & (1u8 << (index & 7)) != 0
    }

    /// The bytes holding the bits, `ceil(len / 8)` of them.
    pub fn bytes(&self) -> &[u8] {
        &self.bits.bytes()[..(self.len + 7) / 8]
    }

    /// The underlying fixed size bit array, e.g. for nearest neighbor search.
    pub fn bit_array(&self) -> &BitArray<64> {
        &self.bits
    }

    /// Number of differing bits.
    pub fn hamming(&self, other: &Self) -> u32 {
        self.bytes()
            .iter()
            .zip(other.bytes())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// The sampling frame of a keypoint in its level.
///
/// Offsets `(u, v)` are in units of the keypoint scale along the keypoint's
/// orientation and perpendicular to it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SampleFrame<'a> {
    pub level: &'a EvolutionLevel,
    pub xf: f32,
    pub yf: f32,
    pub scale: f32,
    pub co: f32,
    pub si: f32,
}

impl<'a> SampleFrame<'a> {
    pub fn new(keypoint: &KeyPoint, level: &'a EvolutionLevel, upright: bool) -> Self {
        let ratio = level.ratio();
        let angle = if upright { 0.0 } else { keypoint.angle };
        let (xf, yf) = level_coordinates(keypoint, ratio);
        Self {
            level,
            xf,
            yf,
            scale: f32::round(0.5 * keypoint.size / ratio).max(1.0),
            co: angle.cos(),
            si: angle.sin(),
        }
    }

    /// Level coordinates of the sample at offset `(u, v)`.
    #[inline]
    pub fn point(&self, u: f32, v: f32) -> (f32, f32) {
        (
            self.xf + (u * self.co - v * self.si) * self.scale,
            self.yf + (u * self.si + v * self.co) * self.scale,
        )
    }

    /// Express an image gradient in the frame's axes.
    #[inline]
    pub fn rotate_gradient(&self, rx: f32, ry: f32) -> (f32, f32) {
        (rx * self.co + ry * self.si, -rx * self.si + ry * self.co)
    }

    /// Bilinear gradient at offset `(u, v)`, in the frame's axes.
    pub fn gradient_bilinear(&self, u: f32, v: f32) -> (f32, f32) {
        let (x, y) = self.point(u, v);
        self.rotate_gradient(
            sample_bilinear(&self.level.Lx, x, y),
            sample_bilinear(&self.level.Ly, x, y),
        )
    }
}

/// Position of the keypoint in the pixels of a level with downsampling
/// `ratio`, where pixel centers of every level sit at integer coordinates.
pub(crate) fn level_coordinates(keypoint: &KeyPoint, ratio: f32) -> (f32, f32) {
    let offset = 0.5 * (ratio - 1.0);
    (
        (keypoint.point.0 - offset) / ratio,
        (keypoint.point.1 - offset) / ratio,
    )
}

/// Bilinear interpolation with pixel centers at integer coordinates. The
/// coordinates are clamped to the image.
pub(crate) fn sample_bilinear(image: &GrayFloatImage, x: f32, y: f32) -> f32 {
    let x = x.clamp(0.0, (image.width() - 1) as f32);
    let y = y.clamp(0.0, (image.height() - 1) as f32);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as isize, y0 as isize);
    let top = (1.0 - fx) * image.get_clamped(x0, y0) + fx * image.get_clamped(x0 + 1, y0);
    let bottom =
        (1.0 - fx) * image.get_clamped(x0, y0 + 1) + fx * image.get_clamped(x0 + 1, y0 + 1);
    (1.0 - fy) * top + fy * bottom
}

/// The nearest pixel, clamped to the image.
pub(crate) fn sample_nearest(image: &GrayFloatImage, x: f32, y: f32) -> f32 {
    image.get_clamped(x.round() as isize, y.round() as isize)
}

/// Unnormalized Gaussian.
#[inline]
pub(crate) fn gaussian(x: f32, y: f32, sigma: f32) -> f32 {
    (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
}

/// Scale to unit L2 norm, leaving an all zero vector alone.
pub(crate) fn normalize(descriptor: &mut [f32]) {
    let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        descriptor.iter_mut().for_each(|v| *v /= norm);
    }
}
