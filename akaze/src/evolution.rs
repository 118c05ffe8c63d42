use crate::{Config, GrayFloatImage};
use std::ops::Index;

/// Octaves (other than the first) whose smaller side is below this are not built.
const MIN_OCTAVE_SIZE: usize = 80;

/// Where a level sits in the pyramid and the scale it represents. Known as
/// soon as the configuration is, before any image is seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelGeometry {
    /// Image octave
    pub octave: u32,
    /// Image sublevel in each octave
    pub sublevel: u32,
    /// Evolution sigma. For linear diffusion t = sigma^2 / 2
    pub esigma: f64,
    /// Evolution time
    pub etime: f64,
    /// Integer derivative scale in the pixels of this level's octave
    pub sigma_size: u32,
    pub width: usize,
    pub height: usize,
}

impl LevelGeometry {
    /// Downsampling factor of the octave relative to the input image.
    pub fn ratio(&self) -> f32 {
        (1u32 << self.octave) as f32
    }
}

/// Compute the geometry of every level, in pyramid order.
///
/// Every octave has `num_sublevels` levels. Octaves past the first are only
/// allocated while the downsampled image keeps at least 80 pixels on its
/// smaller side, as there is too little information left below that.
pub fn plan_levels(config: &Config) -> Vec<LevelGeometry> {
    let mut levels = vec![];
    let mut width = config.width as usize;
    let mut height = config.height as usize;
    for octave in 0..config.num_octaves {
        if octave != 0 {
            width /= 2;
            height /= 2;
            if width.min(height) < MIN_OCTAVE_SIZE {
                break;
            }
        }
        let ratio = 2.0f64.powi(octave as i32);
        for sublevel in 0..config.num_sublevels {
            let esigma = config.base_scale_offset
                * f64::powf(
                    2.0f64,
                    f64::from(sublevel) / f64::from(config.num_sublevels) + f64::from(octave),
                );
            let sigma_size = (esigma * config.derivative_factor / ratio).round().max(1.0) as u32;
            levels.push(LevelGeometry {
                octave,
                sublevel,
                esigma,
                etime: 0.5 * (esigma * esigma),
                sigma_size,
                width,
                height,
            });
        }
    }
    levels
}

/// One level of the nonlinear scale space.
#[derive(Debug)]
#[allow(non_snake_case)]
pub struct EvolutionLevel {
    pub geometry: LevelGeometry,
    /// Number of explicit diffusion steps used to reach this level
    pub fed_steps: usize,
    /// Evolution image
    pub Lt: GrayFloatImage,
    /// Smoothed image
    pub Lsmooth: GrayFloatImage,
    /// First order spatial derivative
    pub Lx: GrayFloatImage,
    /// First order spatial derivatives
    pub Ly: GrayFloatImage,
    /// Second order spatial derivative
    pub Lxx: GrayFloatImage,
    /// Second order spatial derivatives
    pub Lyy: GrayFloatImage,
    /// Second order spatial derivatives
    pub Lxy: GrayFloatImage,
    /// Diffusivity image, only retained for diagnostics
    pub Lflow: GrayFloatImage,
    /// Detector response
    pub Ldet: GrayFloatImage,
}

impl EvolutionLevel {
    /// Create an empty level with the given geometry.
    pub fn new(geometry: LevelGeometry) -> Self {
        Self {
            geometry,
            fed_steps: 0,
            Lt: GrayFloatImage::new(0, 0),
            Lsmooth: GrayFloatImage::new(0, 0),
            Lx: GrayFloatImage::new(0, 0),
            Ly: GrayFloatImage::new(0, 0),
            Lxx: GrayFloatImage::new(0, 0),
            Lyy: GrayFloatImage::new(0, 0),
            Lxy: GrayFloatImage::new(0, 0),
            Lflow: GrayFloatImage::new(0, 0),
            Ldet: GrayFloatImage::new(0, 0),
        }
    }

    pub fn esigma(&self) -> f64 {
        self.geometry.esigma
    }

    pub fn etime(&self) -> f64 {
        self.geometry.etime
    }

    pub fn octave(&self) -> u32 {
        self.geometry.octave
    }

    pub fn sublevel(&self) -> u32 {
        self.geometry.sublevel
    }

    pub fn ratio(&self) -> f32 {
        self.geometry.ratio()
    }

    pub fn width(&self) -> usize {
        self.Lt.width()
    }

    pub fn height(&self) -> usize {
        self.Lt.height()
    }
}

/// The pyramid of evolution levels of one image.
///
/// Levels are stored contiguously in pyramid order and are never added or
/// removed once the scale space is built, so a level can be addressed either
/// by its position or by `(octave, sublevel)`.
#[derive(Debug)]
pub struct ScaleSpace {
    levels: Vec<EvolutionLevel>,
    num_sublevels: u32,
    detected: bool,
}

impl ScaleSpace {
    pub(crate) fn new(levels: Vec<EvolutionLevel>, num_sublevels: u32) -> Self {
        Self {
            levels,
            num_sublevels,
            detected: false,
        }
    }

    pub fn levels(&self) -> &[EvolutionLevel] {
        &self.levels
    }

    pub(crate) fn levels_mut(&mut self) -> &mut [EvolutionLevel] {
        &mut self.levels
    }

    /// The level of the given octave and sublevel, if it was built.
    pub fn level(&self, octave: u32, sublevel: u32) -> Option<&EvolutionLevel> {
        if sublevel >= self.num_sublevels {
            return None;
        }
        self.levels
            .get((octave * self.num_sublevels + sublevel) as usize)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Whether derivatives and detector responses are available.
    pub fn is_detected(&self) -> bool {
        self.detected
    }

    pub(crate) fn mark_detected(&mut self) {
        self.detected = true;
    }
}

impl Index<usize> for ScaleSpace {
    type Output = EvolutionLevel;

    fn index(&self, index: usize) -> &EvolutionLevel {
        &self.levels[index]
    }
}
