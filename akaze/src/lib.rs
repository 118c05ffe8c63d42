//! AKAZE feature detection and description.
//!
//! Keypoints are found as scale space extrema of the determinant of the
//! Hessian in a nonlinear scale space. The scale space is built with Fast
//! Explicit Diffusion, which blurs homogeneous regions while keeping edges.
//! Every keypoint is described with SURF, M-SURF or the binary M-LDB
//! descriptor, either upright or relative to its dominant orientation.
//!
//! The pipeline runs in three stages which can be driven one at a time:
//!
//! ```no_run
//! use akaze::{Akaze, Config};
//!
//! let image = image::open("image.png").unwrap();
//! let mut akaze = Akaze::new(Config::new(image.width(), image.height())).unwrap();
//! let gray = akaze::image::GrayFloatImage::from_dynamic(&image);
//! akaze.create_nonlinear_scale_space(&gray).unwrap();
//! let mut keypoints = akaze.feature_detection().unwrap();
//! let descriptors = akaze.compute_descriptors(&mut keypoints).unwrap();
//! assert_eq!(keypoints.len(), descriptors.len());
//! ```
//!
//! or all at once with [`Akaze::extract`].

mod config;
mod contrast_factor;
mod derivatives;
mod descriptors;
mod detector_response;
mod diffusivity;
mod error;
mod evolution;
mod fed;
pub mod image;
mod nonlinear_diffusion;
mod orientation;
mod scale_space_extrema;
mod subpixel;
mod suppression;

pub use config::*;
pub use descriptors::pattern::{Cell, Comparison, DescriptorPattern};
pub use descriptors::{BinaryDescriptor, Descriptors};
pub use error::{BuildError, ConfigError, Error, SequencingError};
pub use evolution::{EvolutionLevel, LevelGeometry, ScaleSpace};
pub use fed::{FedSchedule, LevelSchedule};

use crate::image::GrayFloatImage;
use ::image::DynamicImage;
use cv_core::nalgebra::Point2;
use cv_core::ImagePoint;
use log::*;
use std::path::Path;
use std::sync::Arc;

/// A point of interest in an image.
/// This pretty much follows from OpenCV conventions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyPoint {
    /// The horizontal coordinate in a coordinate system is
    /// defined s.t. +x faces right and starts from the top
    /// of the image.
    /// the vertical coordinate in a coordinate system is defined
    /// s.t. +y faces toward the bottom of an image and starts
    /// from the left side of the image.
    pub point: (f32, f32),
    /// The magnitude of response from the detector.
    pub response: f32,

    /// The radius defining the extent of the keypoint, in pixel units
    pub size: f32,

    /// The octave of the level in which the keypoint was detected.
    pub octave: usize,

    /// Index of the evolution level in which the keypoint was detected.
    pub level: usize,

    /// The orientation angle in radians, in `[0, 2pi)`.
    pub angle: f32,
}

impl ImagePoint for KeyPoint {
    fn image_point(&self) -> Point2<f64> {
        Point2::new(self.point.0 as f64, self.point.1 as f64)
    }
}

/// The descriptor family of a configuration, with what it needs precomputed.
#[derive(Debug)]
enum DescriptorKind {
    Surf,
    Msurf,
    Mldb(DescriptorPattern),
}

impl DescriptorKind {
    fn from_config(config: &Config) -> Self {
        match config.descriptor {
            DescriptorType::SurfUpright | DescriptorType::Surf => DescriptorKind::Surf,
            DescriptorType::MsurfUpright | DescriptorType::Msurf => DescriptorKind::Msurf,
            DescriptorType::MldbUpright | DescriptorType::Mldb => {
                DescriptorKind::Mldb(DescriptorPattern::from_config(config))
            }
        }
    }
}

/// Everything that only depends on the configuration. It is shared by all
/// images processed with it, including across clones of the engine.
#[derive(Debug)]
struct Precomputed {
    geometry: Vec<LevelGeometry>,
    fed: FedSchedule,
    descriptor: DescriptorKind,
}

/// The AKAZE engine for one configuration.
///
/// It holds the scale space of the last image it was given, so the stages
/// have to be called in order: [`Akaze::create_nonlinear_scale_space`], then
/// [`Akaze::feature_detection`], then [`Akaze::compute_descriptors`].
/// Building a new scale space discards the previous one.
#[derive(Debug)]
pub struct Akaze {
    config: Config,
    shared: Arc<Precomputed>,
    scale_space: Option<ScaleSpace>,
}

impl Akaze {
    /// Validate the configuration and precompute the level geometry, the
    /// FED schedule and the binary descriptor pattern.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let geometry = evolution::plan_levels(&config);
        let fed = FedSchedule::new(
            &geometry,
            config.fed_tau_max,
            config.fed_max_cycle_steps,
            config.fed_reordering,
        );
        let descriptor = DescriptorKind::from_config(&config);
        debug!(
            "Planned {} evolution levels with {} FED steps in total.",
            geometry.len(),
            fed.levels().iter().map(LevelSchedule::num_steps).sum::<usize>()
        );
        Ok(Self {
            config,
            shared: Arc::new(Precomputed {
                geometry,
                fed,
                descriptor,
            }),
            scale_space: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fed_schedule(&self) -> &FedSchedule {
        &self.shared.fed
    }

    pub fn level_geometry(&self) -> &[LevelGeometry] {
        &self.shared.geometry
    }

    /// The M-LDB sampling pattern, for binary descriptor types only.
    pub fn descriptor_pattern(&self) -> Option<&DescriptorPattern> {
        match &self.shared.descriptor {
            DescriptorKind::Mldb(pattern) => Some(pattern),
            DescriptorKind::Surf | DescriptorKind::Msurf => None,
        }
    }

    /// The scale space of the last image, if it was built successfully.
    pub fn scale_space(&self) -> Option<&ScaleSpace> {
        self.scale_space.as_ref()
    }

    /// Drop the scale space of the last image.
    pub fn reset(&mut self) {
        self.scale_space = None;
    }

    /// Build the nonlinear scale space of `image`.
    ///
    /// The image has to have the configured dimensions. On failure no scale
    /// space is retained, not even the one of a previous image.
    pub fn create_nonlinear_scale_space(&mut self, image: &GrayFloatImage) -> Result<(), Error> {
        self.scale_space = None;
        if image.width() != self.config.width as usize
            || image.height() != self.config.height as usize
        {
            return Err(ConfigError::ImageSizeMismatch {
                width: self.config.width,
                height: self.config.height,
                actual_width: image.width() as u32,
                actual_height: image.height() as u32,
            }
            .into());
        }
        trace!("Creating nonlinear scale space.");
        let scale_space = self.build_scale_space(image)?;
        trace!("Nonlinear scale space finished.");
        self.scale_space = Some(scale_space);
        Ok(())
    }

    /// Compute the detector response of every level and find the keypoints.
    ///
    /// Candidates are scale space extrema of the response, refined to sub-pixel
    /// and sub-level accuracy and then thinned out by the suppression distance.
    pub fn feature_detection(&mut self) -> Result<Vec<KeyPoint>, Error> {
        let scale_space = self
            .scale_space
            .as_mut()
            .ok_or(SequencingError::ScaleSpaceNotBuilt)?;
        detector_response::detector_response(scale_space.levels_mut());
        scale_space.mark_detected();
        trace!("Computing detector response finished.");
        let scale_space = &*scale_space;
        let candidates =
            scale_space_extrema::find_scale_space_extrema(scale_space, self.config.detector_threshold);
        let keypoints = subpixel::do_subpixel_refinement(scale_space, &candidates, &self.config);
        let keypoints =
            suppression::suppress_neighbors(keypoints, self.config.suppression_distance as f32);
        info!("Detected {} keypoints.", keypoints.len());
        Ok(keypoints)
    }

    /// Compute the descriptor of every keypoint, in order.
    ///
    /// For rotation invariant descriptor types the dominant orientation is
    /// estimated first and written to [`KeyPoint::angle`]; upright types set
    /// it to zero.
    pub fn compute_descriptors(&self, keypoints: &mut [KeyPoint]) -> Result<Descriptors, Error> {
        let scale_space = self
            .scale_space
            .as_ref()
            .ok_or(SequencingError::ScaleSpaceNotBuilt)?;
        if !scale_space.is_detected() {
            return Err(SequencingError::FeaturesNotDetected.into());
        }
        if let Some(keypoint) = keypoints.iter().find(|kp| kp.level >= scale_space.len()) {
            return Err(Error::UnknownLevel {
                level: keypoint.level,
                levels: scale_space.len(),
            });
        }
        let upright = self.config.descriptor.is_upright();
        if upright {
            keypoints.iter_mut().for_each(|kp| kp.angle = 0.0);
        } else {
            orientation::compute_main_orientations(keypoints, scale_space);
            trace!("Computing main orientations finished.");
        }
        let descriptors = match &self.shared.descriptor {
            DescriptorKind::Surf => Descriptors::Float(descriptors::describe_all(
                &descriptors::surf::Surf { upright },
                keypoints,
                scale_space,
            )),
            DescriptorKind::Msurf => Descriptors::Float(descriptors::describe_all(
                &descriptors::msurf::Msurf { upright },
                keypoints,
                scale_space,
            )),
            DescriptorKind::Mldb(pattern) => Descriptors::Binary(descriptors::describe_all(
                &descriptors::mldb::Mldb { pattern, upright },
                keypoints,
                scale_space,
            )),
        };
        trace!("Computing descriptors finished.");
        Ok(descriptors)
    }

    /// Extract features using the Akaze feature extractor.
    ///
    /// This performs all operations end-to-end. The client might be only interested
    /// in certain portions of the process, all of which are exposed in public functions,
    /// but this function can document how the various parts fit together.
    ///
    /// # Arguments
    /// * `image` - The input image for which to extract features.
    ///
    /// Returns the keypoints and the descriptors.
    ///
    /// # Example
    /// ```
    /// use akaze::{Akaze, Config};
    /// let image = image::DynamicImage::ImageLuma8(image::GrayImage::from_fn(128, 128, |x, y| {
    ///     image::Luma([if (32..96).contains(&x) && (32..96).contains(&y) { 255 } else { 0 }])
    /// }));
    /// let mut akaze = Akaze::new(Config::dense(128, 128)).unwrap();
    /// let (keypoints, descriptors) = akaze.extract(&image).unwrap();
    /// assert_eq!(keypoints.len(), descriptors.len());
    /// ```
    pub fn extract(&mut self, image: &DynamicImage) -> Result<(Vec<KeyPoint>, Descriptors), Error> {
        self.extract_from_gray_float_image(&GrayFloatImage::from_dynamic(image))
    }

    /// Same as [`Akaze::extract`], for an image already converted to float.
    pub fn extract_from_gray_float_image(
        &mut self,
        image: &GrayFloatImage,
    ) -> Result<(Vec<KeyPoint>, Descriptors), Error> {
        self.create_nonlinear_scale_space(image)?;
        trace!("Finding image keypoints.");
        let mut keypoints = self.feature_detection()?;
        trace!("Extracting descriptors.");
        let descriptors = self.compute_descriptors(&mut keypoints)?;
        info!("Extracted {} features", keypoints.len());
        Ok((keypoints, descriptors))
    }

    /// Extract features using the Akaze feature extractor from an image on disk.
    ///
    /// # Arguments
    /// * `path` - The input image path for which to extract features.
    ///
    /// Returns the keypoints and the descriptors.
    pub fn extract_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(Vec<KeyPoint>, Descriptors), Error> {
        self.extract(&::image::open(path)?)
    }

    /// The evolution image of every level, in pyramid order.
    ///
    /// Only available when `save_scale_space` is set. With `rescale` every
    /// image is mapped to `[0, 1]`.
    pub fn scale_space_images(&self, rescale: bool) -> Result<Vec<GrayFloatImage>, Error> {
        self.diagnostic_images(rescale, |level| &level.Lt)
    }

    /// The diffusivity of every level, in pyramid order. For every level past
    /// the first this is the conductivity of its last FED cycle.
    ///
    /// Only available when `save_scale_space` is set. With `rescale` every
    /// image is mapped to `[0, 1]`.
    pub fn diffusivity_images(&self, rescale: bool) -> Result<Vec<GrayFloatImage>, Error> {
        self.diagnostic_images(rescale, |level| &level.Lflow)
    }

    fn diagnostic_images(
        &self,
        rescale: bool,
        image: impl Fn(&EvolutionLevel) -> &GrayFloatImage,
    ) -> Result<Vec<GrayFloatImage>, Error> {
        if !self.config.save_scale_space {
            return Err(ConfigError::DiagnosticsDisabled.into());
        }
        let scale_space = self
            .scale_space
            .as_ref()
            .ok_or(SequencingError::ScaleSpaceNotBuilt)?;
        Ok(scale_space
            .levels()
            .iter()
            .map(|level| {
                if rescale {
                    image(level).normalized()
                } else {
                    image(level).clone()
                }
            })
            .collect())
    }
}

impl Clone for Akaze {
    /// A clone shares the precomputed configuration data but starts without
    /// a scale space.
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            shared: self.shared.clone(),
            scale_space: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: usize) -> GrayFloatImage {
        GrayFloatImage::from_fn(size, size, |x, y| {
            let inside = |v: usize| (size / 4..3 * size / 4).contains(&v);
            if inside(x) && inside(y) {
                0.9
            } else {
                0.1
            }
        })
    }

    #[test]
    fn stages_must_run_in_order() {
        let mut akaze = Akaze::new(Config::dense(64, 64)).unwrap();
        assert!(matches!(
            akaze.feature_detection(),
            Err(Error::Sequencing(SequencingError::ScaleSpaceNotBuilt))
        ));
        assert!(matches!(
            akaze.compute_descriptors(&mut []),
            Err(Error::Sequencing(SequencingError::ScaleSpaceNotBuilt))
        ));
        akaze.create_nonlinear_scale_space(&square(64)).unwrap();
        assert!(matches!(
            akaze.compute_descriptors(&mut []),
            Err(Error::Sequencing(SequencingError::FeaturesNotDetected))
        ));
        let mut keypoints = akaze.feature_detection().unwrap();
        akaze.compute_descriptors(&mut keypoints).unwrap();
        akaze.reset();
        assert!(akaze.scale_space().is_none());
    }

    #[test]
    fn failed_build_discards_previous_scale_space() {
        let mut akaze = Akaze::new(Config::new(64, 64)).unwrap();
        akaze.create_nonlinear_scale_space(&square(64)).unwrap();
        assert!(akaze.scale_space().is_some());
        let flat = GrayFloatImage::from_fn(64, 64, |_, _| 0.5);
        assert!(matches!(
            akaze.create_nonlinear_scale_space(&flat),
            Err(Error::Build(BuildError::DegenerateContrast))
        ));
        assert!(akaze.scale_space().is_none());
    }

    #[test]
    fn diagnostics_need_to_be_enabled() {
        let mut akaze = Akaze::new(Config::new(64, 64)).unwrap();
        akaze.create_nonlinear_scale_space(&square(64)).unwrap();
        assert!(matches!(
            akaze.scale_space_images(true),
            Err(Error::Config(ConfigError::DiagnosticsDisabled))
        ));

        let mut akaze = Akaze::new(Config {
            save_scale_space: true,
            ..Config::new(64, 64)
        })
        .unwrap();
        akaze.create_nonlinear_scale_space(&square(64)).unwrap();
        let images = akaze.scale_space_images(true).unwrap();
        let flows = akaze.diffusivity_images(false).unwrap();
        assert_eq!(images.len(), akaze.level_geometry().len());
        assert_eq!(flows.len(), images.len());
        for image in &images {
            assert!(image.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
        for flow in &flows {
            assert_eq!((flow.width(), flow.height()), (64, 64));
            assert!(flow.iter().all(|&v| v > 0.0 && v <= 1.0));
        }
    }

    #[test]
    fn clones_share_precomputed_data() {
        let mut akaze = Akaze::new(Config::new(64, 64)).unwrap();
        akaze.create_nonlinear_scale_space(&square(64)).unwrap();
        let clone = akaze.clone();
        assert!(Arc::ptr_eq(&akaze.shared, &clone.shared));
        assert!(clone.scale_space().is_none());
    }

    #[test]
    fn only_binary_types_carry_a_pattern() {
        for descriptor in [
            DescriptorType::SurfUpright,
            DescriptorType::Surf,
            DescriptorType::MsurfUpright,
            DescriptorType::Msurf,
            DescriptorType::MldbUpright,
            DescriptorType::Mldb,
        ] {
            let config = Config {
                descriptor,
                descriptor_size: 256,
                ..Config::new(64, 64)
            };
            let akaze = Akaze::new(config).unwrap();
            match akaze.descriptor_pattern() {
                Some(pattern) => {
                    assert!(descriptor.is_binary());
                    assert_eq!(pattern.len(), config.binary_descriptor_length());
                }
                None => assert!(!descriptor.is_binary()),
            }
        }
    }

    #[test]
    fn keypoint_is_an_image_point() {
        let keypoint = KeyPoint {
            point: (3.5, 7.25),
            response: 1.0,
            size: 2.4,
            octave: 0,
            level: 1,
            angle: 0.0,
        };
        assert_eq!(keypoint.image_point(), Point2::new(3.5, 7.25));
    }
}
