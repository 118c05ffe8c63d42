#![allow(dead_code)]

use akaze::image::GrayFloatImage;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

pub fn init_logger() {
    let _ = pretty_env_logger::try_init_timed();
}

/// A bright square of side `side` centered in a dark `size` x `size` image.
pub fn square(size: usize, side: usize) -> GrayFloatImage {
    let start = (size - side) / 2;
    let inside = |v: usize| (start..start + side).contains(&v);
    GrayFloatImage::from_fn(size, size, |x, y| {
        if inside(x) && inside(y) {
            0.8
        } else {
            0.2
        }
    })
}

/// Smooth texture made of randomly placed anisotropic Gaussian blobs.
pub fn blobs(width: usize, height: usize, count: usize, seed: u64) -> GrayFloatImage {
    let mut rng = Pcg64::seed_from_u64(seed);
    let blobs: Vec<(f32, f32, f32, f32, f32)> = (0..count)
        .map(|_| {
            (
                rng.gen_range(0.0..width as f32),
                rng.gen_range(0.0..height as f32),
                rng.gen_range(3.0f32..10.0),
                rng.gen_range(3.0f32..10.0),
                rng.gen_range(-0.4f32..0.4),
            )
        })
        .collect();
    GrayFloatImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as f32, y as f32);
        0.5 + blobs
            .iter()
            .map(|&(bx, by, sx, sy, amplitude)| {
                let dx = (x - bx) / sx;
                let dy = (y - by) / sy;
                amplitude * (-0.5 * (dx * dx + dy * dy)).exp()
            })
            .sum::<f32>()
    })
}

/// The image turned by 90 degrees clockwise, `(x, y)` goes to `(h - 1 - y, x)`.
pub fn rotate90(image: &GrayFloatImage) -> GrayFloatImage {
    let (w, h) = (image.width(), image.height());
    GrayFloatImage::from_fn(h, w, |x, y| image.get(y, h - 1 - x))
}

pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(a, b)| a * b).sum();
    let na: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    dot / (na * nb).max(f32::EPSILON)
}
