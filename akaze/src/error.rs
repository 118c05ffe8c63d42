use thiserror::Error;

/// Everything that can go wrong while configuring or running the pipeline.
///
/// The three families are kept apart so callers can tell a bad configuration
/// from an image that cannot be processed and from calling the stages in the
/// wrong order.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("scale space construction failed: {0}")]
    Build(#[from] BuildError),
    #[error("pipeline stages called out of order: {0}")]
    Sequencing(#[from] SequencingError),
    #[error("failed to load image: {0}")]
    Image(#[from] ::image::ImageError),
    #[error("keypoint belongs to level {level} but the scale space has {levels} levels")]
    UnknownLevel { level: usize, levels: usize },
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("image dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("the number of octaves must be at least 1")]
    NoOctaves,
    #[error("the number of sublevels per octave must be at least 1")]
    NoSublevels,
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} must be non-negative and finite, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("contrast percentile must lie in (0, 1], got {0}")]
    InvalidPercentile(f64),
    #[error("the contrast histogram needs at least one bin")]
    NoHistogramBins,
    #[error("the FED cycle step cap must be at least 1")]
    NoCycleSteps,
    #[error("descriptor channels must be 1, 2 or 3, got {0}")]
    InvalidChannels(usize),
    #[error("descriptor pattern size must be at least 1")]
    EmptyPattern,
    #[error("binary descriptor size {0} is not a multiple of 8")]
    UnalignedDescriptorSize(usize),
    #[error("binary descriptor size {size} exceeds the full pattern length {max}")]
    DescriptorSizeTooLarge { size: usize, max: usize },
    #[error("input image is {actual_width}x{actual_height} but the configuration expects {width}x{height}")]
    ImageSizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("diagnostic images were not retained; enable `save_scale_space`")]
    DiagnosticsDisabled,
}

/// Failures while building the nonlinear scale space of one image.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("image of {width}x{height} is smaller than the {min}x{min} base smoothing kernel")]
    ImageTooSmall { width: u32, height: u32, min: u32 },
    #[error("image has no gradients, the contrast factor cannot be estimated")]
    DegenerateContrast,
}

/// A stage was requested before the stage it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("the nonlinear scale space has not been built")]
    ScaleSpaceNotBuilt,
    #[error("features have not been detected on the current scale space")]
    FeaturesNotDetected,
}
