use crate::evolution::{EvolutionLevel, ScaleSpace};
use log::*;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A scale space maximum at integer coordinates of its level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub level: usize,
    pub x: usize,
    pub y: usize,
    pub response: f32,
}

/// Map a pixel coordinate of a level with downsampling `from_ratio` onto the
/// grid of a level with downsampling `to_ratio`, by pixel centers.
pub(crate) fn map_coordinate(v: usize, from_ratio: f32, to_ratio: f32) -> isize {
    ((v as f32 + 0.5) * from_ratio / to_ratio).floor() as isize
}

/// Find the scale space maxima of the detector response.
///
/// A pixel of an interior level is a candidate when its response exceeds the
/// threshold and it is strictly greater than its 8 neighbors, as well as the
/// 3x3 neighborhoods around the corresponding pixel of the level below and
/// the level above. An adjacent neighborhood that does not fit inside its
/// level is not compared. Pixels too close to the border for the descriptor
/// footprint are skipped.
///
/// The candidates are ordered by level, then row, then column.
pub(crate) fn find_scale_space_extrema(scale_space: &ScaleSpace, threshold: f64) -> Vec<Candidate> {
    let levels = scale_space.levels();
    if levels.len() < 3 {
        debug!("{} levels are too few to search for extrema.", levels.len());
        return vec![];
    }
    let interior = 1..levels.len() - 1;
    #[cfg(not(feature = "rayon"))]
    let per_level: Vec<Vec<Candidate>> = interior
        .map(|i| level_extrema(levels, i, threshold as f32))
        .collect();
    #[cfg(feature = "rayon")]
    let per_level: Vec<Vec<Candidate>> = interior
        .into_par_iter()
        .map(|i| level_extrema(levels, i, threshold as f32))
        .collect();
    let candidates: Vec<Candidate> = per_level.into_iter().flatten().collect();
    debug!("Found {} scale space extrema.", candidates.len());
    candidates
}

fn level_extrema(levels: &[EvolutionLevel], i: usize, threshold: f32) -> Vec<Candidate> {
    let level = &levels[i];
    let ldet = &level.Ldet;
    let (w, h) = (ldet.width(), ldet.height());
    let smax = 10.0f32 * f32::sqrt(2.0f32);
    let margin = (smax * level.geometry.sigma_size as f32).round() as usize + 1;
    let mut candidates = vec![];
    if w <= 2 * margin || h <= 2 * margin {
        return candidates;
    }
    for y in margin..h - margin {
        for x in margin..w - margin {
            let value = ldet.get(x, y);
            if value <= threshold {
                continue;
            }
            let spatial_max = (y - 1..=y + 1)
                .flat_map(|ny| (x - 1..=x + 1).map(move |nx| (nx, ny)))
                .filter(|&(nx, ny)| (nx, ny) != (x, y))
                .all(|(nx, ny)| value > ldet.get(nx, ny));
            if spatial_max
                && exceeds_neighborhood(value, level, &levels[i - 1], x, y)
                && exceeds_neighborhood(value, level, &levels[i + 1], x, y)
            {
                candidates.push(Candidate {
                    level: i,
                    x,
                    y,
                    response: value,
                });
            }
        }
    }
    trace!("{} extrema in evolution {}.", candidates.len(), i);
    candidates
}

/// Whether `value` beats the 3x3 neighborhood of `other` around the pixel
/// corresponding to `(x, y)`. Neighborhoods crossing the border of `other`
/// are not compared.
fn exceeds_neighborhood(
    value: f32,
    level: &EvolutionLevel,
    other: &EvolutionLevel,
    x: usize,
    y: usize,
) -> bool {
    let ox = map_coordinate(x, level.ratio(), other.ratio());
    let oy = map_coordinate(y, level.ratio(), other.ratio());
    let (w, h) = (other.Ldet.width() as isize, other.Ldet.height() as isize);
    if ox < 1 || oy < 1 || ox + 1 >= w || oy + 1 >= h {
        return true;
    }
    (oy - 1..=oy + 1)
        .flat_map(|ny| (ox - 1..=ox + 1).map(move |nx| (nx, ny)))
        .all(|(nx, ny)| value > other.Ldet.get(nx as usize, ny as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{plan_levels, EvolutionLevel};
    use crate::image::GrayFloatImage;
    use crate::Config;

    /// A scale space whose responses are Gaussian bumps of the given heights
    /// at the same place on every level.
    fn bumps(config: &Config, center: (f32, f32), heights: &[f32]) -> ScaleSpace {
        let levels = plan_levels(config)
            .into_iter()
            .zip(heights)
            .map(|(geometry, &height)| {
                let mut level = EvolutionLevel::new(geometry);
                let ratio = geometry.ratio();
                level.Ldet = GrayFloatImage::from_fn(geometry.width, geometry.height, |x, y| {
                    let dx = (x as f32 + 0.5) * ratio - center.0;
                    let dy = (y as f32 + 0.5) * ratio - center.1;
                    height * (-(dx * dx + dy * dy) / 50.0).exp()
                });
                level
            })
            .collect();
        ScaleSpace::new(levels, config.num_sublevels)
    }

    #[test]
    fn finds_peak_at_strongest_level() {
        let config = Config::new(160, 160);
        let scale_space = bumps(&config, (80.5, 80.5), &[0.1, 0.2, 0.5, 0.3, 0.2, 0.1, 0.05, 0.01]);
        let candidates = find_scale_space_extrema(&scale_space, 0.001);
        assert_eq!(candidates.len(), 1, "{candidates:?}");
        assert_eq!(
            (candidates[0].level, candidates[0].x, candidates[0].y),
            (2, 80, 80)
        );
    }

    #[test]
    fn threshold_rejects_weak_peaks() {
        let config = Config::new(160, 160);
        let scale_space = bumps(&config, (80.5, 80.5), &[0.1, 0.2, 0.5, 0.3, 0.2, 0.1, 0.05, 0.01]);
        assert!(find_scale_space_extrema(&scale_space, 0.6).is_empty());
    }

    #[test]
    fn peaks_near_the_border_are_skipped() {
        let config = Config::new(160, 160);
        let scale_space = bumps(&config, (10.5, 80.5), &[0.1, 0.2, 0.5, 0.3, 0.2, 0.1, 0.05, 0.01]);
        assert!(find_scale_space_extrema(&scale_space, 0.001).is_empty());
    }

    #[test]
    fn cross_octave_mapping_uses_pixel_centers() {
        assert_eq!(map_coordinate(10, 1.0, 2.0), 5);
        assert_eq!(map_coordinate(11, 1.0, 2.0), 5);
        assert_eq!(map_coordinate(5, 2.0, 1.0), 11);
        assert_eq!(map_coordinate(7, 1.0, 1.0), 7);
    }
}
