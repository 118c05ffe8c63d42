//! The M-LDB sampling pattern.
//!
//! The patch around a keypoint is divided into 2x2, 3x3 and 4x4 grids of
//! cells. Every pair of cells of the same grid is compared once per channel,
//! which makes `162` comparisons per channel. The full descriptor holds all
//! of them, pair by pair with the channels of a pair next to each other.
//! A shorter descriptor keeps a deterministic pseudo-random subset of pairs,
//! always starting with the pairs of the coarsest grid.

use crate::Config;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Cells per side of each grid.
pub const GRID_DIVISIONS: [usize; 3] = [2, 3, 4];
/// Seed of the subset selection.
const SUBSET_SEED: u64 = 1024;

/// Number of cell pairs over all grids.
pub const fn num_pairs() -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < GRID_DIVISIONS.len() {
        let cells = GRID_DIVISIONS[i] * GRID_DIVISIONS[i];
        total += cells * (cells - 1) / 2;
        i += 1;
    }
    total
}

/// Length in bits of the full descriptor with `channels` channels.
pub const fn full_length(channels: usize) -> usize {
    num_pairs() * channels
}

/// A square cell of sample offsets `origin..origin + size` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub u: i32,
    pub v: i32,
    pub size: i32,
}

/// One bit of the descriptor: channel `channel` of cell `a` greater than
/// that of cell `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub a: usize,
    pub b: usize,
    pub channel: usize,
    /// Position of this comparison in the full descriptor.
    pub full_index: usize,
}

/// The precomputed M-LDB sampling pattern of one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorPattern {
    pattern_size: usize,
    channels: usize,
    cells: Vec<Cell>,
    comparisons: Vec<Comparison>,
}

impl DescriptorPattern {
    /// The pattern for the configured pattern size, channels and length.
    pub fn from_config(config: &Config) -> Self {
        if config.descriptor_size == 0 {
            Self::full(config.descriptor_pattern_size, config.descriptor_channels)
        } else {
            Self::subset(
                config.descriptor_pattern_size,
                config.descriptor_channels,
                config.descriptor_size,
            )
        }
    }

    /// Every comparison, in full descriptor order.
    pub fn full(pattern_size: usize, channels: usize) -> Self {
        let (cells, pairs) = Self::grid(pattern_size);
        let comparisons = pairs
            .iter()
            .enumerate()
            .flat_map(|(pair, &(a, b))| {
                (0..channels).map(move |channel| Comparison {
                    a,
                    b,
                    channel,
                    full_index: pair * channels + channel,
                })
            })
            .collect();
        Self {
            pattern_size,
            channels,
            cells,
            comparisons,
        }
    }

    /// The first `bits` comparisons of a seeded selection of pairs. The
    /// six pairs of the 2x2 grid come first, then pairs are drawn without
    /// replacement. Each drawn pair contributes all of its channels.
    pub fn subset(pattern_size: usize, channels: usize, bits: usize) -> Self {
        let (cells, pairs) = Self::grid(pattern_size);
        let coarse = GRID_DIVISIONS[0] * GRID_DIVISIONS[0];
        let coarse_pairs = coarse * (coarse - 1) / 2;
        let mut rng = Pcg64::seed_from_u64(SUBSET_SEED);
        let mut remaining: Vec<usize> = (coarse_pairs..pairs.len()).collect();
        let picks = (bits + channels - 1) / channels;
        let mut comparisons = Vec::with_capacity(picks * channels);
        for pick in 0..picks.min(pairs.len()) {
            let pair = if pick < coarse_pairs {
                pick
            } else {
                remaining.swap_remove(rng.gen_range(0..remaining.len()))
            };
            let (a, b) = pairs[pair];
            comparisons.extend((0..channels).map(|channel| Comparison {
                a,
                b,
                channel,
                full_index: pair * channels + channel,
            }));
        }
        comparisons.truncate(bits);
        Self {
            pattern_size,
            channels,
            cells,
            comparisons,
        }
    }

    /// All cells of every grid and all pairs of cells sharing a grid, as
    /// indices into the cells.
    fn grid(pattern_size: usize) -> (Vec<Cell>, Vec<(usize, usize)>) {
        let p = pattern_size as i32;
        let mut cells = vec![];
        let mut pairs = vec![];
        for &divisions in &GRID_DIVISIONS {
            let step = (2 * p + divisions as i32 - 1) / divisions as i32;
            let first = cells.len();
            for cy in 0..divisions as i32 {
                for cx in 0..divisions as i32 {
                    cells.push(Cell {
                        u: -p + cx * step,
                        v: -p + cy * step,
                        size: step,
                    });
                }
            }
            for a in first..cells.len() {
                for b in a + 1..cells.len() {
                    pairs.push((a, b));
                }
            }
        }
        (cells, pairs)
    }

    pub fn pattern_size(&self) -> usize {
        self.pattern_size
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    /// Descriptor length in bits.
    pub fn len(&self) -> usize {
        self.comparisons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }

    /// Which comparisons of the full descriptor this pattern uses.
    pub fn comparison_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; full_length(self.channels)];
        for comparison in &self.comparisons {
            mask[comparison.full_index] = true;
        }
        mask
    }
}
