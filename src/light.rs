//! Light sources. A light is attached to a primitive; when a path hits that
//! primitive the integrator queries the light's emittance and terminates
//! (emitters are assumed not to re-reflect incoming light).

use crate::math::Vec3;
use crate::spectrum::Distribution;

/// The closed set of light models. The emittance spectrum is referenced by
/// index into the scene's distribution arena.
#[derive(Debug, Clone)]
pub enum Light {
    /// Isotropic emitter: the same spectral power in every direction.
    Omni { emittance: usize },
}

impl Light {
    /// Spectral emittance towards the incident direction at a surface point
    /// with the given normal. Omni lights ignore both directions.
    pub fn emittance(
        &self,
        spectra: &[Distribution],
        _incident: Vec3,
        _normal: Vec3,
        wavelength: f32,
    ) -> f32 {
        match *self {
            Light::Omni { emittance } => spectra[emittance].lookup(wavelength),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omni_emittance_is_isotropic() {
        let spectra = vec![Distribution::Flat { value: 2.5 }];
        let light = Light::Omni { emittance: 0 };
        let a = light.emittance(&spectra, Vec3::new(0.0, -1.0, 0.0), Vec3::up(), 550.0);
        let b = light.emittance(&spectra, Vec3::new(1.0, 0.0, 0.0), -Vec3::up(), 420.0);
        assert_eq!(a, 2.5);
        assert_eq!(b, 2.5);
    }
}
