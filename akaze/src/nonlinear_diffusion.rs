use crate::contrast_factor::compute_contrast_factor;
use crate::derivatives::{simple_scharr_horizontal, simple_scharr_vertical};
use crate::error::BuildError;
use crate::evolution::{EvolutionLevel, ScaleSpace};
use crate::image::{gaussian_blur, gaussian_kernel_size, GrayFloatImage};
use crate::Akaze;
use log::*;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Contrast factor decay applied on every octave change.
const OCTAVE_CONTRAST_DECAY: f64 = 0.75;

/// This function performs a scalar non-linear diffusion step.
///
/// Forward Euler scheme with a 3x3 stencil:
/// dL_by_ds = d(c dL_by_dx)_by_dx + d(c dL_by_dy)_by_dy
///
/// The conductivity between two pixels is the mean of theirs, and nothing
/// flows across the image border.
///
/// # Arguments
/// * `lt` - The image, advanced in place
/// * `conductivities` - Conductivity image
/// * `step_size` - The step size in time units
pub fn calculate_step(lt: &mut GrayFloatImage, conductivities: &GrayFloatImage, step_size: f32) {
    let width = lt.width();
    let height = lt.height();
    let input = lt.0.as_raw().clone();
    let conductivities = conductivities.0.as_raw();
    let half_step = 0.5 * step_size;
    let output: &mut [f32] = &mut lt.0;
    let diffuse_row = |(y, row_out): (usize, &mut [f32])| {
        let start = y * width;
        for (x, out) in row_out.iter_mut().enumerate() {
            let i = start + x;
            let l = input[i];
            let c = conductivities[i];
            let mut flux = 0.0;
            if x + 1 < width {
                flux += (c + conductivities[i + 1]) * (input[i + 1] - l);
            }
            if x > 0 {
                flux -= (c + conductivities[i - 1]) * (l - input[i - 1]);
            }
            if y + 1 < height {
                flux += (c + conductivities[i + width]) * (input[i + width] - l);
            }
            if y > 0 {
                flux -= (c + conductivities[i - width]) * (l - input[i - width]);
            }
            *out = l + half_step * flux;
        }
    };
    #[cfg(not(feature = "rayon"))]
    output.chunks_exact_mut(width).enumerate().for_each(diffuse_row);
    #[cfg(feature = "rayon")]
    output
        .par_chunks_exact_mut(width)
        .enumerate()
        .for_each(diffuse_row);
}

impl Akaze {
    /// A nonlinear scale space performs selective blurring to preserve edges.
    ///
    /// The base level is the input blurred with the base scale offset. Each
    /// further level starts from the previous one (halved on octave changes)
    /// and runs its FED cycles. The diffusivity is recomputed from the current
    /// image at the start of every cycle and held fixed inside it.
    ///
    /// # Arguments
    /// * `image` - The input image, already checked against the configured size.
    pub(crate) fn build_scale_space(&self, image: &GrayFloatImage) -> Result<ScaleSpace, BuildError> {
        let min = gaussian_kernel_size(self.config.base_scale_offset as f32) as u32;
        if image.width() < min as usize || image.height() < min as usize {
            return Err(BuildError::ImageTooSmall {
                width: image.width() as u32,
                height: image.height() as u32,
                min,
            });
        }
        let geometry = &self.shared.geometry;
        let smoothing = self.config.derivative_smoothing as f32;
        let mut levels: Vec<EvolutionLevel> = Vec::with_capacity(geometry.len());

        trace!("Creating first evolution.");
        let mut base = EvolutionLevel::new(geometry[0]);
        base.Lt = gaussian_blur(image, self.config.base_scale_offset as f32);
        base.Lsmooth = gaussian_blur(&base.Lt, smoothing);
        debug!(
            "Convolving first evolution with sigma={} Gaussian.",
            self.config.base_scale_offset
        );
        let mut contrast_factor = compute_contrast_factor(
            &base.Lt,
            self.config.contrast_percentile,
            1.0f64,
            self.config.contrast_factor_num_bins,
        )?;
        debug!(
            "Contrast percentile={}, Num bins={}, Initial contrast factor={}",
            self.config.contrast_percentile, self.config.contrast_factor_num_bins, contrast_factor
        );
        if self.config.save_scale_space {
            base.Lflow = self.conductivity(&base.Lt, smoothing, contrast_factor);
        }
        levels.push(base);

        for (i, &level_geometry) in geometry.iter().enumerate().skip(1) {
            trace!("Creating evolution {}.", i);
            let previous = &levels[i - 1];
            let mut level = EvolutionLevel::new(level_geometry);
            if level_geometry.octave > previous.octave() {
                level.Lt = previous.Lt.half_size();
                contrast_factor *= OCTAVE_CONTRAST_DECAY;
                debug!(
                    "New image size: {}x{}, new contrast factor: {}",
                    level.Lt.width(),
                    level.Lt.height(),
                    contrast_factor
                );
            } else {
                level.Lt = previous.Lt.clone();
            }
            let schedule = self.shared.fed.level(i);
            for cycle in &schedule.cycles {
                let flow = self.conductivity(&level.Lt, smoothing, contrast_factor);
                for &step_size in cycle {
                    calculate_step(&mut level.Lt, &flow, step_size as f32);
                }
                if self.config.save_scale_space {
                    level.Lflow = flow;
                }
            }
            level.fed_steps = schedule.num_steps();
            trace!(
                "Diffusion of evolution {} finished after {} steps.",
                i,
                level.fed_steps
            );
            level.Lsmooth = gaussian_blur(&level.Lt, smoothing);
            levels.push(level);
        }
        Ok(ScaleSpace::new(levels, self.config.num_sublevels))
    }

    fn conductivity(&self, lt: &GrayFloatImage, smoothing: f32, contrast_factor: f64) -> GrayFloatImage {
        let smooth = gaussian_blur(lt, smoothing);
        let lx = simple_scharr_horizontal(&smooth);
        let ly = simple_scharr_vertical(&smooth);
        self.config
            .diffusivity
            .conductivity_image(&lx, &ly, contrast_factor)
    }
}
