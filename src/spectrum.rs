//! Spectral distributions: wavelength → scalar lookup tables, analytic or
//! parametric. The same type serves three roles depending on how a material
//! or light uses it — reflectance in [0, 1), refractive index ≥ 1, or
//! emitted spectral power ≥ 0.

/// A spectral distribution evaluated over the visible range [380, 780] nm.
///
/// Distributions are parsed once at scene load into a shared arena and
/// referenced by index from materials and lights; they are immutable for the
/// lifetime of the render.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Planck black-body emission spectrum at the given temperature (kelvin).
    BlackBody { temperature: f32 },
    /// A constant value at every wavelength.
    Flat { value: f32 },
    /// A near-monochromatic gaussian peak centered on `peak` (nanometers).
    Peak { peak: f32 },
    /// A refractive-index curve from the three-term Sellmeier equation.
    Sellmeier { b: [f32; 3], c: [f32; 3] },
}

impl Distribution {
    /// Evaluates the distribution at a wavelength given in nanometers.
    pub fn lookup(&self, wavelength: f32) -> f32 {
        match *self {
            Distribution::BlackBody { temperature } => {
                // Planck's law wants the wavelength in meters.
                let lambda = wavelength * 1e-9;
                let power = 3.74183e-16 * lambda.powf(-5.0);
                power / ((1.4388e-2 / (lambda * temperature)).exp() - 1.0)
            }
            Distribution::Flat { value } => value,
            Distribution::Peak { peak } => (-(wavelength - peak).powi(2) * 0.002).exp(),
            Distribution::Sellmeier { b, c } => {
                // The Sellmeier coefficients are specified for micrometers.
                let lambda = wavelength * 1e-3;
                let l2 = lambda * lambda;
                let mut index = 1.0;
                for t in 0..3 {
                    index += b[t] * l2 / (l2 - c[t]);
                }
                index.sqrt()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_is_constant() {
        let d = Distribution::Flat { value: 0.37 };
        assert_eq!(d.lookup(380.0), 0.37);
        assert_eq!(d.lookup(780.0), 0.37);
    }

    #[test]
    fn peak_is_maximal_at_center() {
        let d = Distribution::Peak { peak: 550.0 };
        assert_abs_diff_eq!(d.lookup(550.0), 1.0, epsilon = 1e-6);
        assert!(d.lookup(550.0) > d.lookup(560.0));
        assert!(d.lookup(560.0) > d.lookup(620.0));
    }

    #[test]
    fn black_body_6500k_peaks_in_the_blue_green() {
        // Wien's displacement law puts the 6500K maximum near 446nm; the
        // spectrum must at least decrease from there towards the red end.
        let d = Distribution::BlackBody { temperature: 6500.0 };
        assert!(d.lookup(450.0) > d.lookup(700.0));
        assert!(d.lookup(450.0) > 0.0);
    }

    #[test]
    fn sellmeier_reproduces_bk7() {
        // Schott BK7 coefficients; n at the helium d-line (587.56nm).
        let d = Distribution::Sellmeier {
            b: [1.039_612_12, 0.231_792_344, 1.010_469_45],
            c: [0.006_000_698_67, 0.020_017_914_4, 103.560_653],
        };
        assert_abs_diff_eq!(d.lookup(587.56), 1.5168, epsilon = 1e-3);
    }
}
