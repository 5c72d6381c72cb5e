//! Material reflectance and importance-sampling models (BRDFs and BTDFs).
//!
//! Every material exposes the same two operations: `sample` draws an
//! importance-sampled exitant direction for an incident ray (displacing the
//! intersection origin off the surface to dodge self-intersection), and
//! `reflectance` evaluates the incident→exitant transfer at one wavelength.
//!
//! The `sampled` flag tells `reflectance` whether the exitant direction came
//! out of this material's own `sample` — in that case the sampling PDF is
//! divided out analytically, which is why e.g. the diffuse case collapses to
//! a bare reflectance lookup.

use std::f32::consts::PI;

use rand::Rng;

use crate::math::{is_delta, rotate_to_frame, spherical, Vec3, EPSILON};
use crate::spectrum::Distribution;

/// Exclusive upper bound for reflectance values. Keeping every result
/// strictly below 1 guarantees the integrator's Russian-roulette loop
/// terminates.
const REFLECTANCE_MAX: f32 = 1.0 - 1e-6;

/// Clamps a reflectance into [0, 1); non-finite values (degenerate
/// microfacet angles, division blow-ups) contribute nothing.
#[inline]
fn clamp_reflectance(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, REFLECTANCE_MAX)
    } else {
        0.0
    }
}

/// Unpolarized Fresnel reflectance at a dielectric interface: the average of
/// the s- and p-polarized components, from the incident and transmitted
/// angle cosines and the refractive indices on either side.
pub(crate) fn fresnel(cos_i: f32, cos_t: f32, n1: f32, n2: f32) -> f32 {
    let r_s = (n1 * cos_i - n2 * cos_t) / (n1 * cos_i + n2 * cos_t);
    let r_p = (n2 * cos_i - n1 * cos_t) / (n1 * cos_t + n2 * cos_i);
    (r_s * r_s + r_p * r_p) * 0.5
}

/// Draws a microfacet normal from the Beckmann distribution with roughness
/// `α`, in the canonical +Y-up frame: θ = atan(√(−α² ln(1−u₁))), φ = 2πu₂.
fn beckmann_sample(roughness: f32, rng: &mut impl Rng) -> Vec3 {
    let u1: f32 = rng.gen();
    let u2: f32 = rng.gen();
    let theta = (-(roughness * roughness) * (1.0 - u1).ln()).sqrt().atan();
    let phi = 2.0 * PI * u2;
    spherical(phi, theta)
}

/// Beckmann density term for a half-vector at angle cosine `cos_alpha` from
/// the normal: exp(−tan²α / α²_roughness).
fn beckmann_density(cos_alpha: f32, roughness: f32) -> f32 {
    let alpha = cos_alpha.clamp(-1.0, 1.0).acos();
    (-(alpha.tan() / roughness).powi(2)).exp()
}

// ─── Material ───────────────────────────────────────────────────────────────

/// The closed set of material models. Spectral quantities (reflectance,
/// refractive index) are referenced by index into the scene's distribution
/// arena.
#[derive(Debug, Clone)]
pub enum MaterialKind {
    /// Lambertian scattering with a spectral reflectance.
    Diffuse { reflectance: usize },
    /// Perfect mirror with a spectral reflectance.
    Specular { reflectance: usize },
    /// Ideal dielectric: Fresnel-weighted reflection/refraction.
    SmoothGlass { refractive_index: usize },
    /// Dielectric with a Beckmann microfacet surface.
    FrostedGlass { refractive_index: usize, roughness: f32 },
    /// Rough conductor-style Cook–Torrance reflection lobe.
    CookTorrance {
        reflectance: usize,
        refractive_index: usize,
        roughness: f32,
    },
}

/// A material: a reflectance model plus the extinction coefficients of the
/// media on either side of the surface (`e1` outside, on the normal's side;
/// `e2` inside), used for Beer–Lambert attenuation along ray segments.
#[derive(Debug, Clone)]
pub struct Material {
    pub e1: f32,
    pub e2: f32,
    pub kind: MaterialKind,
}

impl Material {
    /// Returns an importance-sampled exitant direction for the given
    /// incident direction and geometric normal at one wavelength.
    ///
    /// `origin` is displaced by ±ε along the sampling normal onto the side
    /// the new ray departs from.
    pub fn sample(
        &self,
        spectra: &[Distribution],
        origin: &mut Vec3,
        incident: Vec3,
        normal: Vec3,
        wavelength: f32,
        rng: &mut impl Rng,
    ) -> Vec3 {
        match self.kind {
            MaterialKind::Diffuse { .. } => {
                let mut normal = normal;
                if incident.dot(normal) > 0.0 {
                    normal = -normal;
                }
                *origin += normal * EPSILON;

                /* Cosine-weighted hemisphere sample in the normal's frame. */
                let u1: f32 = rng.gen();
                let u2: f32 = rng.gen();
                let theta = 2.0 * PI * u2;
                let r = u1.sqrt();
                let direction = Vec3::new(r * theta.cos(), (1.0 - u1).sqrt(), r * theta.sin());
                rotate_to_frame(direction, normal)
            }

            MaterialKind::Specular { .. } => {
                let mut normal = normal;
                if incident.dot(normal) > 0.0 {
                    normal = -normal;
                }
                *origin += normal * EPSILON;
                incident.reflect(normal)
            }

            MaterialKind::SmoothGlass { refractive_index } => {
                let eta = spectra[refractive_index].lookup(wavelength);

                /* Pick n1/n2 from the side the ray arrives on. */
                let mut normal = normal;
                let mut cos_i = incident.dot(normal);
                let (n1, n2) = if cos_i > 0.0 {
                    // Leaving the medium.
                    normal = -normal;
                    (eta, 1.0)
                } else {
                    cos_i = -cos_i;
                    (1.0, eta)
                };

                let eta_ratio = n1 / n2;
                let cos_t2 = 1.0 - eta_ratio * eta_ratio * (1.0 - cos_i * cos_i);
                if cos_t2 < 0.0 {
                    // Total internal reflection.
                    *origin += normal * EPSILON;
                    return incident.reflect(normal);
                }
                let cos_t = cos_t2.sqrt();

                /* Choose reflection or refraction with Fresnel probability. */
                if rng.gen::<f32>() < fresnel(cos_i, cos_t, n1, n2) {
                    *origin += normal * EPSILON;
                    incident.reflect(normal)
                } else {
                    *origin -= normal * EPSILON;
                    incident * eta_ratio + normal * (eta_ratio * cos_i - cos_t)
                }
            }

            MaterialKind::FrostedGlass {
                refractive_index,
                roughness,
            } => {
                let eta = spectra[refractive_index].lookup(wavelength);

                /* A Beckmann microfacet normal stands in for the surface
                 * normal in every smooth-glass decision below. */
                let mut m = rotate_to_frame(beckmann_sample(roughness, rng), normal);

                let mut cos_i = incident.dot(normal);
                let (n1, n2) = if cos_i > 0.0 {
                    m = -m;
                    (eta, 1.0)
                } else {
                    cos_i = -cos_i;
                    (1.0, eta)
                };

                let eta_ratio = n1 / n2;
                let cos_t2 = 1.0 - eta_ratio * eta_ratio * (1.0 - cos_i * cos_i);
                if cos_t2 < 0.0 {
                    *origin += m * EPSILON;
                    return incident.reflect(m);
                }
                let cos_t = cos_t2.sqrt();

                if rng.gen::<f32>() < fresnel(cos_i, cos_t, n1, n2) {
                    *origin += m * EPSILON;
                    incident.reflect(m)
                } else {
                    *origin -= m * EPSILON;
                    incident * eta_ratio + m * (eta_ratio * cos_i - cos_t)
                }
            }

            MaterialKind::CookTorrance { roughness, .. } => {
                let mut normal = normal;
                if incident.dot(normal) > 0.0 {
                    normal = -normal;
                }
                *origin += normal * EPSILON;

                let m = rotate_to_frame(beckmann_sample(roughness, rng), normal);
                incident.reflect(m)
            }
        }
    }

    /// Evaluates the reflectance for an incident/exitant pair at one
    /// wavelength. `sampled` indicates the exitant direction was produced by
    /// this material's `sample`, letting importance-sampled factors cancel.
    ///
    /// Results are always in [0, 1) — strictly below 1 so the path tracer's
    /// Russian roulette terminates.
    pub fn reflectance(
        &self,
        spectra: &[Distribution],
        incident: Vec3,
        exitant: Vec3,
        normal: Vec3,
        wavelength: f32,
        sampled: bool,
    ) -> f32 {
        match self.kind {
            MaterialKind::Diffuse { reflectance } => {
                let r = spectra[reflectance].lookup(wavelength);
                if sampled {
                    /* Cosine-weighted sampling: the 1/π and the cosine term
                     * cancel against the PDF, leaving the bare reflectance. */
                    clamp_reflectance(r)
                } else {
                    clamp_reflectance(2.0 * r * exitant.dot(normal).abs())
                }
            }

            MaterialKind::Specular { reflectance } => {
                if sampled {
                    clamp_reflectance(spectra[reflectance].lookup(wavelength))
                } else {
                    /* A delta lobe: nonzero only along the mirror direction. */
                    let expected = incident.reflect(normal);
                    if is_delta(1.0 - expected.dot(exitant)) {
                        clamp_reflectance(spectra[reflectance].lookup(wavelength))
                    } else {
                        0.0
                    }
                }
            }

            MaterialKind::SmoothGlass { .. } => {
                if sampled {
                    /* The Fresnel split already weighted the path choice, so
                     * the sampled throughput is unit (clamped under 1). */
                    clamp_reflectance(1.0)
                } else {
                    /* Delta BTDFs cannot be evaluated for arbitrary pairs. */
                    0.0
                }
            }

            MaterialKind::FrostedGlass {
                refractive_index,
                roughness,
            } => {
                let eta = spectra[refractive_index].lookup(wavelength);

                let mut normal = normal;
                let (n1, n2) = if incident.dot(normal) > 0.0 {
                    normal = -normal;
                    (eta, 1.0)
                } else {
                    (1.0, eta)
                };
                let eta_ratio = n1 / n2;

                /* Recover the microfacet normal: reflection and refraction
                 * leave different half-vectors behind. */
                let half = if incident.dot(exitant) < 0.0 {
                    (exitant - incident).normalized()
                } else {
                    let cos_i = incident.dot(normal).abs();
                    let cos_t =
                        (1.0 - eta_ratio * eta_ratio * (1.0 - cos_i * cos_i)).max(0.0).sqrt();
                    (incident * eta_ratio - exitant) / (eta_ratio * cos_i - cos_t)
                };

                let d = if sampled {
                    1.0
                } else {
                    beckmann_density(half.dot(normal), roughness)
                };

                let n_dot_v = incident.dot(normal).abs();
                let n_dot_l = exitant.dot(normal).abs();
                let v_dot_h = incident.dot(half).abs();
                let n_dot_h = normal.dot(half).abs();
                let g = 1.0f32
                    .min(2.0 * n_dot_h * n_dot_v / v_dot_h)
                    .min(2.0 * n_dot_h * n_dot_l / v_dot_h);

                /* Fresnel is deliberately absent: the sampling step already
                 * split reflection/refraction by it. */
                let norm = 1.0 / (PI * roughness * roughness * n_dot_h.powi(4));
                clamp_reflectance(norm * d * g / n_dot_v)
            }

            MaterialKind::CookTorrance {
                reflectance,
                refractive_index,
                roughness,
            } => {
                let d = if sampled {
                    1.0
                } else {
                    beckmann_density(exitant.dot(normal), roughness)
                };

                let mut normal = normal;
                if incident.dot(normal) > 0.0 {
                    normal = -normal;
                }

                let half = (exitant - incident).normalized();

                let n2 = spectra[refractive_index].lookup(wavelength);
                let n1 = 1.0;
                let cos_i = incident.dot(normal).abs();
                let cos_t = (1.0 - (n1 / n2).powi(2) * (1.0 - cos_i * cos_i)).sqrt();
                let f = fresnel(cos_i, cos_t, n1, n2);

                let n_dot_l = normal.dot(exitant).abs();
                let v_dot_h = incident.dot(half).abs();
                let n_dot_h = normal.dot(half).abs();
                let n_dot_v = cos_i;
                let g = 1.0f32
                    .min(2.0 * n_dot_h * n_dot_v / v_dot_h)
                    .min(2.0 * n_dot_h * n_dot_l / v_dot_h);

                let norm = 1.0 / (PI * roughness * roughness * n_dot_h.powi(4));
                clamp_reflectance(norm * spectra[reflectance].lookup(wavelength) * f * d * g / n_dot_v)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn test_spectra() -> Vec<Distribution> {
        vec![
            Distribution::Flat { value: 0.75 },
            Distribution::Flat { value: 1.52 },
        ]
    }

    fn all_materials() -> Vec<Material> {
        vec![
            Material { e1: 0.0, e2: 0.0, kind: MaterialKind::Diffuse { reflectance: 0 } },
            Material { e1: 0.0, e2: 0.0, kind: MaterialKind::Specular { reflectance: 0 } },
            Material { e1: 0.0, e2: 0.0, kind: MaterialKind::SmoothGlass { refractive_index: 1 } },
            Material {
                e1: 0.0,
                e2: 0.0,
                kind: MaterialKind::FrostedGlass { refractive_index: 1, roughness: 0.2 },
            },
            Material {
                e1: 0.0,
                e2: 0.0,
                kind: MaterialKind::CookTorrance {
                    reflectance: 0,
                    refractive_index: 1,
                    roughness: 0.2,
                },
            },
        ]
    }

    #[test]
    fn reflectance_is_bounded_for_all_materials() {
        let spectra = test_spectra();
        let mut rng = SmallRng::seed_from_u64(11);

        for material in all_materials() {
            for _ in 0..200 {
                let incident = crate::math::spherical(
                    rng.gen_range(0.0..2.0 * PI),
                    rng.gen_range(0.0..PI),
                );
                let exitant = crate::math::spherical(
                    rng.gen_range(0.0..2.0 * PI),
                    rng.gen_range(0.0..PI),
                );
                let normal = crate::math::spherical(
                    rng.gen_range(0.0..2.0 * PI),
                    rng.gen_range(0.0..PI),
                );
                let wavelength = rng.gen_range(380.0..780.0);
                for sampled in [false, true] {
                    let rho = material.reflectance(
                        &spectra, incident, exitant, normal, wavelength, sampled,
                    );
                    assert!(
                        (0.0..1.0).contains(&rho),
                        "reflectance {rho} out of [0,1) for {:?}",
                        material.kind
                    );
                }
            }
        }
    }

    #[test]
    fn sampled_reflectance_bounded_for_sampled_pairs() {
        // Exercise the sampled=true path with exitants actually produced by
        // sample(), which is how the integrator always calls it.
        let spectra = test_spectra();
        let mut rng = SmallRng::seed_from_u64(23);
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let incident = Vec3::new(0.4, -0.8, 0.2).normalized();

        for material in all_materials() {
            for _ in 0..200 {
                let mut origin = Vec3::zero();
                let wavelength = rng.gen_range(380.0..780.0);
                let exitant =
                    material.sample(&spectra, &mut origin, incident, normal, wavelength, &mut rng);
                let rho = material.reflectance(&spectra, incident, exitant, normal, wavelength, true);
                assert!((0.0..1.0).contains(&rho), "rho {rho} for {:?}", material.kind);
            }
        }
    }

    #[test]
    fn fresnel_is_symmetric_under_interface_reversal() {
        // R(θi, n1, n2) == R(θt, n2, n1) with θt given by Snell's law.
        let n1 = 1.0f32;
        let n2 = 1.52f32;
        for &cos_i in &[0.99f32, 0.8, 0.5, 0.25, 0.05] {
            let sin_i = (1.0 - cos_i * cos_i).sqrt();
            let sin_t = sin_i * n1 / n2;
            let cos_t = (1.0 - sin_t * sin_t).sqrt();
            let forward = fresnel(cos_i, cos_t, n1, n2);
            let reverse = fresnel(cos_t, cos_i, n2, n1);
            assert_abs_diff_eq!(forward, reverse, epsilon = 1e-5);
        }
    }

    #[test]
    fn diffuse_samples_stay_in_the_upper_hemisphere() {
        let spectra = test_spectra();
        let material = Material { e1: 0.0, e2: 0.0, kind: MaterialKind::Diffuse { reflectance: 0 } };
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let incident = Vec3::new(0.3, -0.9, 0.1).normalized();
        let mut rng = SmallRng::seed_from_u64(5);

        for _ in 0..500 {
            let mut origin = Vec3::zero();
            let exitant = material.sample(&spectra, &mut origin, incident, normal, 550.0, &mut rng);
            assert!(exitant.dot(normal) >= 0.0);
            // Origin displaced to the incident side.
            assert!(origin.y > 0.0);
        }
    }

    #[test]
    fn specular_sample_obeys_the_law_of_reflection() {
        let spectra = test_spectra();
        let material = Material { e1: 0.0, e2: 0.0, kind: MaterialKind::Specular { reflectance: 0 } };
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let incident = Vec3::new(0.6, -0.8, 0.0);
        let mut origin = Vec3::zero();
        let mut rng = SmallRng::seed_from_u64(1);
        let exitant = material.sample(&spectra, &mut origin, incident, normal, 550.0, &mut rng);
        assert_abs_diff_eq!(exitant.x, 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(exitant.y, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn smooth_glass_conserves_direction_plane() {
        // Both the reflected and refracted directions must stay in the
        // incidence plane spanned by the incident direction and the normal.
        let spectra = test_spectra();
        let material =
            Material { e1: 0.0, e2: 0.0, kind: MaterialKind::SmoothGlass { refractive_index: 1 } };
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let incident = Vec3::new(0.5, -0.866, 0.0).normalized();
        let mut rng = SmallRng::seed_from_u64(99);

        for _ in 0..100 {
            let mut origin = Vec3::zero();
            let exitant = material.sample(&spectra, &mut origin, incident, normal, 550.0, &mut rng);
            assert_abs_diff_eq!(exitant.z, 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn glass_delta_lobes_evaluate_to_zero_unsampled() {
        let spectra = test_spectra();
        let material =
            Material { e1: 0.0, e2: 0.0, kind: MaterialKind::SmoothGlass { refractive_index: 1 } };
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let incident = Vec3::new(0.5, -0.866, 0.0).normalized();
        let exitant = Vec3::new(0.1, 0.99, 0.0).normalized();
        assert_eq!(
            material.reflectance(&spectra, incident, exitant, normal, 550.0, false),
            0.0
        );
    }
}
