use crate::descriptors::pattern;
use crate::error::ConfigError;

/// Default number of octaves.
pub const DEFAULT_NUM_OCTAVES: u32 = 4;
/// Default number of sublevels per octave.
pub const DEFAULT_NUM_SUBLEVELS: u32 = 4;
/// Default base scale offset (sigma units).
pub const DEFAULT_BASE_SCALE_OFFSET: f64 = 1.6;
/// Default sigma of the Gaussian applied before computing derivatives.
pub const DEFAULT_DERIVATIVE_SMOOTHING: f64 = 1.0;
/// Default factor between the evolution sigma and the derivative scale.
pub const DEFAULT_DERIVATIVE_FACTOR: f64 = 1.5;
/// Default percentile of the gradient histogram used for the contrast factor.
pub const DEFAULT_CONTRAST_PERCENTILE: f64 = 0.7;
/// Default number of bins of the gradient histogram.
pub const DEFAULT_CONTRAST_FACTOR_NUM_BINS: usize = 300;
/// Default detector response threshold.
pub const DEFAULT_DETECTOR_THRESHOLD: f64 = 0.001;
/// Default binary descriptor length in bits, 0 means the full pattern.
pub const DEFAULT_DESCRIPTOR_SIZE: usize = 0;
/// Default number of M-LDB channels.
pub const DEFAULT_DESCRIPTOR_CHANNELS: usize = 3;
/// Default M-LDB pattern size. The sampled patch is `2 * pattern_size * scale` wide.
pub const DEFAULT_DESCRIPTOR_PATTERN_SIZE: usize = 10;
/// Default minimum distance between surviving keypoints, 0 disables suppression.
pub const DEFAULT_SUPPRESSION_DISTANCE: f64 = 0.0;
/// Stability limit of the explicit 3x3 diffusion stencil.
pub const DEFAULT_FED_TAU_MAX: f64 = 0.25;
/// Default cap on the number of FED steps inside one cycle.
pub const DEFAULT_FED_MAX_CYCLE_STEPS: usize = 20;

/// Conductance function of the nonlinear diffusion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Diffusivity {
    /// Perona-Malik `exp(-|dL|^2 / k^2)`, favours high contrast edges.
    PmG1,
    /// Perona-Malik `1 / (1 + |dL|^2 / k^2)`, favours wide regions.
    PmG2,
    /// Weickert `1 - exp(-3.315 / (|dL| / k)^8)`.
    Weickert,
    /// Charbonnier `1 / sqrt(1 + |dL|^2 / k^2)`.
    Charbonnier,
}

/// The descriptor computed for every keypoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DescriptorType {
    SurfUpright,
    Surf,
    MsurfUpright,
    Msurf,
    MldbUpright,
    Mldb,
}

impl DescriptorType {
    /// Upright descriptors skip the orientation estimate.
    pub fn is_upright(self) -> bool {
        matches!(
            self,
            DescriptorType::SurfUpright | DescriptorType::MsurfUpright | DescriptorType::MldbUpright
        )
    }

    pub fn is_binary(self) -> bool {
        matches!(self, DescriptorType::MldbUpright | DescriptorType::Mldb)
    }
}

/// Contains the configuration parameters of AKAZE.
///
/// The most important parameter to pay attention to is `detector_threshold`.
/// [`Config::new`] creates the default configuration for an image size and
/// [`Config::sparse`] and [`Config::dense`] adjust the threshold. The default
/// value of `detector_threshold` is `0.001`.
///
/// A `Config` is only checked when it is handed to [`crate::Akaze::new`], which
/// keeps its own copy afterwards.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Width of the images that will be processed.
    pub width: u32,

    /// Height of the images that will be processed.
    pub height: u32,

    /// Maximum octave evolution of the image 2^sigma (coarsest scale sigma units)
    pub num_octaves: u32,

    /// Number of sublevels per octave
    pub num_sublevels: u32,

    /// Base scale offset (sigma units)
    pub base_scale_offset: f64,

    /// Sigma of the Gaussian smoothing before derivatives are taken
    pub derivative_smoothing: f64,

    /// Factor for the multiscale derivatives
    pub derivative_factor: f64,

    /// Percentile level for the contrast factor
    pub contrast_percentile: f64,

    /// Number of bins for the contrast factor histogram
    pub contrast_factor_num_bins: usize,

    /// Detector response threshold to accept point
    pub detector_threshold: f64,

    /// Conductance function of the diffusion
    pub diffusivity: Diffusivity,

    /// Which descriptor to compute
    pub descriptor: DescriptorType,

    /// Size of the binary descriptor in bits, 0 for the full descriptor
    pub descriptor_size: usize,

    /// Number of channels in the binary descriptor (1, 2, 3)
    pub descriptor_channels: usize,

    /// Actual patch size is 2*pattern_size*point.scale
    pub descriptor_pattern_size: usize,

    /// Keypoints closer than this (in pixels) to a stronger one are dropped
    pub suppression_distance: f64,

    /// Stability limit of a single explicit diffusion step
    pub fed_tau_max: f64,

    /// Largest number of FED steps in one cycle before it is split
    pub fed_max_cycle_steps: usize,

    /// Permute the FED steps inside a cycle to limit rounding errors
    pub fed_reordering: bool,

    /// Keep evolution and diffusivity images for inspection
    pub save_scale_space: bool,
}

impl Config {
    /// Default parameters for images of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Create a `Config` that sparsely detects features.
    ///
    /// Uses a threshold of `0.01` (default is `0.001`).
    pub fn sparse(width: u32, height: u32) -> Self {
        Self {
            detector_threshold: 0.01,
            ..Self::new(width, height)
        }
    }

    /// Create a `Config` that densely detects features.
    ///
    /// Uses a threshold of `0.0001` (default is `0.001`).
    pub fn dense(width: u32, height: u32) -> Self {
        Self {
            detector_threshold: 0.0001,
            ..Self::new(width, height)
        }
    }

    /// Check every parameter, reporting the first offending one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.num_octaves < 1 {
            return Err(ConfigError::NoOctaves);
        }
        if self.num_sublevels < 1 {
            return Err(ConfigError::NoSublevels);
        }
        positive("base_scale_offset", self.base_scale_offset)?;
        positive("derivative_smoothing", self.derivative_smoothing)?;
        positive("derivative_factor", self.derivative_factor)?;
        positive("fed_tau_max", self.fed_tau_max)?;
        non_negative("detector_threshold", self.detector_threshold)?;
        non_negative("suppression_distance", self.suppression_distance)?;
        if !(self.contrast_percentile > 0.0 && self.contrast_percentile <= 1.0) {
            return Err(ConfigError::InvalidPercentile(self.contrast_percentile));
        }
        if self.contrast_factor_num_bins == 0 {
            return Err(ConfigError::NoHistogramBins);
        }
        if self.fed_max_cycle_steps == 0 {
            return Err(ConfigError::NoCycleSteps);
        }
        if self.descriptor.is_binary() {
            if !(1..=3).contains(&self.descriptor_channels) {
                return Err(ConfigError::InvalidChannels(self.descriptor_channels));
            }
            if self.descriptor_pattern_size == 0 {
                return Err(ConfigError::EmptyPattern);
            }
            if self.descriptor_size % 8 != 0 {
                return Err(ConfigError::UnalignedDescriptorSize(self.descriptor_size));
            }
            let max = pattern::full_length(self.descriptor_channels);
            if self.descriptor_size > max {
                return Err(ConfigError::DescriptorSizeTooLarge {
                    size: self.descriptor_size,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Number of bits the binary descriptor will have.
    pub fn binary_descriptor_length(&self) -> usize {
        if self.descriptor_size == 0 {
            pattern::full_length(self.descriptor_channels)
        } else {
            self.descriptor_size
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            width: 0,
            height: 0,
            num_octaves: DEFAULT_NUM_OCTAVES,
            num_sublevels: DEFAULT_NUM_SUBLEVELS,
            base_scale_offset: DEFAULT_BASE_SCALE_OFFSET,
            derivative_smoothing: DEFAULT_DERIVATIVE_SMOOTHING,
            derivative_factor: DEFAULT_DERIVATIVE_FACTOR,
            contrast_percentile: DEFAULT_CONTRAST_PERCENTILE,
            contrast_factor_num_bins: DEFAULT_CONTRAST_FACTOR_NUM_BINS,
            detector_threshold: DEFAULT_DETECTOR_THRESHOLD,
            diffusivity: Diffusivity::PmG2,
            descriptor: DescriptorType::Mldb,
            descriptor_size: DEFAULT_DESCRIPTOR_SIZE,
            descriptor_channels: DEFAULT_DESCRIPTOR_CHANNELS,
            descriptor_pattern_size: DEFAULT_DESCRIPTOR_PATTERN_SIZE,
            suppression_distance: DEFAULT_SUPPRESSION_DISTANCE,
            fed_tau_max: DEFAULT_FED_TAU_MAX,
            fed_max_cycle_steps: DEFAULT_FED_MAX_CYCLE_STEPS,
            fed_reordering: true,
            save_scale_space: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_with_dimensions_is_valid() {
        assert_eq!(Config::new(640, 480).validate(), Ok(()));
        assert_eq!(Config::sparse(640, 480).validate(), Ok(()));
        assert_eq!(Config::dense(640, 480).validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            Config::new(0, 480).validate(),
            Err(ConfigError::InvalidDimensions {
                width: 0,
                height: 480
            })
        );
        let config = Config {
            num_octaves: 0,
            ..Config::new(64, 64)
        };
        assert_eq!(config.validate(), Err(ConfigError::NoOctaves));
        let config = Config {
            num_sublevels: 0,
            ..Config::new(64, 64)
        };
        assert_eq!(config.validate(), Err(ConfigError::NoSublevels));
        let config = Config {
            descriptor_size: 100,
            ..Config::new(64, 64)
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnalignedDescriptorSize(100))
        );
        let config = Config {
            descriptor_size: 512,
            ..Config::new(64, 64)
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DescriptorSizeTooLarge { size: 512, max: 486 })
        );
    }

    #[test]
    fn descriptor_size_only_checked_for_binary() {
        let config = Config {
            descriptor: DescriptorType::Surf,
            descriptor_size: 100,
            ..Config::new(64, 64)
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn binary_length() {
        let mut config = Config::new(64, 64);
        assert_eq!(config.binary_descriptor_length(), 486);
        config.descriptor_channels = 1;
        assert_eq!(config.binary_descriptor_length(), 162);
        config.descriptor_size = 64;
        assert_eq!(config.binary_descriptor_length(), 64);
    }
}
