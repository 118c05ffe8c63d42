use crate::config::Diffusivity;
use crate::image::GrayFloatImage;
use ndarray::azip;

impl Diffusivity {
    /// Conductance for a squared gradient magnitude already divided by `k^2`.
    ///
    /// The result lies in `(0, 1]` and is `1` for a flat neighbourhood.
    #[inline]
    pub fn conductance(self, scaled_gradient_sq: f32) -> f32 {
        match self {
            Diffusivity::PmG1 => (-scaled_gradient_sq).exp(),
            Diffusivity::PmG2 => 1.0 / (1.0 + scaled_gradient_sq),
            Diffusivity::Weickert => {
                if scaled_gradient_sq == 0.0 {
                    1.0
                } else {
                    1.0 - (-3.315 / scaled_gradient_sq.powi(4)).exp()
                }
            }
            Diffusivity::Charbonnier => 1.0 / (1.0 + scaled_gradient_sq).sqrt(),
        }
    }

    /// Conductance for a gradient magnitude `g` and contrast factor `k`.
    pub fn evaluate(self, g: f32, k: f32) -> f32 {
        let ratio = g / k;
        self.conductance(ratio * ratio)
    }

    /// Compute the conductivity image from the image derivatives.
    ///
    /// # Arguments
    /// * `lx` - First order image derivative in X-direction (horizontal)
    /// * `ly` - First order image derivative in Y-direction (vertical)
    /// * `k` - Contrast factor parameter
    pub fn conductivity_image(self, lx: &GrayFloatImage, ly: &GrayFloatImage, k: f64) -> GrayFloatImage {
        assert!(lx.width() == ly.width());
        assert!(lx.height() == ly.height());
        let inverse_k = (1.0f64 / (k * k)) as f32;
        let mut conductivities = lx.zero_array();
        azip!((
            c in &mut conductivities,
            &x in lx.ref_array2(),
            &y in ly.ref_array2(),
        ) {
            *c = self.conductance(inverse_k * (x * x + y * y));
        });
        GrayFloatImage::from_array2(conductivities)
    }
}
