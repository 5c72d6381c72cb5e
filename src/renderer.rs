use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::bvh::{Bvh, LEAF_SIZE};
use crate::color::{self, RESOLUTION, SPECTRUM_START, WAVELENGTHS};
use crate::math::{Ray, Vec3, EPSILON};
use crate::scene::{RenderParams, Scene};

/// Base seed for the per-pixel random streams. Mixing in the pixel index
/// keeps the output bit-identical between runs for any worker count, which
/// dynamic work distribution cannot otherwise guarantee.
pub const RNG_SEED: u64 = 0x530F_D819;

// ─── Render Statistics ──────────────────────────────────────────────────────

/// Aggregate statistics collected during the rendering pass for diagnostic
/// output.
pub struct RenderStats {
    pub total_rays: u64,
    pub elapsed_secs: f64,
    pub width: u32,
    pub height: u32,
    pub spp: u32,
}

impl RenderStats {
    pub fn mrays_per_sec(&self) -> f64 {
        self.total_rays as f64 / self.elapsed_secs / 1e6
    }

    pub fn print_summary(&self) {
        let bar_width = 30;
        let fill = "━".repeat(bar_width);
        eprintln!("  {fill}");
        eprintln!("  Time:     {:.2}s", self.elapsed_secs);
        eprintln!(
            "  Rays:     {:.2}M spectral paths",
            self.total_rays as f64 / 1e6
        );
        eprintln!("  Speed:    {:.2} Mrays/s", self.mrays_per_sec());
        eprintln!(
            "  Image:    {}×{} @ {} spp × {WAVELENGTHS} wavelengths",
            self.width, self.height, self.spp
        );
        eprintln!("  {fill}");
    }
}

// ─── Progress Reporter ──────────────────────────────────────────────────────

/// Lock-free progress counter with throttled console reporting. Workers only
/// ever `fetch_add` and `try_lock`; the printing critical section is skipped
/// outright when contended, so the integrator never blocks on it.
struct Progress {
    total: usize,
    done: AtomicUsize,
    printer: Mutex<PrinterState>,
}

struct PrinterState {
    last_time: Instant,
    last_done: usize,
    last_speed: f64,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            printer: Mutex::new(PrinterState {
                last_time: Instant::now(),
                last_done: 0,
                last_speed: 0.0,
            }),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let Ok(mut state) = self.printer.try_lock() else {
            return;
        };

        let elapsed = state.last_time.elapsed().as_secs_f64();
        if elapsed < 1.0 {
            return;
        }

        /* Exponentially smoothed rate (α = 0.8) for a stable ETA readout. */
        let mut speed = (done - state.last_done) as f64 / elapsed;
        if state.last_done > 0 {
            speed = 0.8 * state.last_speed + 0.2 * speed;
        }
        let remaining = (self.total - done) as f64 / speed.max(1.0);
        let pct = done as f64 * 100.0 / self.total as f64;

        let bar_width = 24;
        let filled = ((pct / 100.0) * bar_width as f64) as usize;
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(bar_width - filled));
        eprint!(
            "\r  Rendering: │{bar}│ {pct:4.1}%  ETA {}   ",
            format_hms(remaining as u64)
        );

        state.last_time = Instant::now();
        state.last_done = done;
        state.last_speed = speed;
    }

    fn finish(&self, elapsed_secs: f64) {
        let bar = "█".repeat(24);
        eprintln!("\r  Rendering: │{bar}│ 100%  {elapsed_secs:.2}s       ");
    }
}

fn format_hms(seconds: u64) -> String {
    format!(
        "{}h{:02}m{:02}s",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

// ─── Spectral Path Tracer ───────────────────────────────────────────────────

/// The rendering core: owns the loaded scene and the BVH built over its
/// primitives, traces spectral radiance paths, and drives the parallel
/// per-pixel loop.
pub struct Renderer {
    scene: Scene,
    bvh: Bvh,
}

impl Renderer {
    /// Takes ownership of a loaded scene and builds the acceleration
    /// structure over its primitive arena (reordering it in place).
    pub fn new(mut scene: Scene) -> Self {
        let bvh = Bvh::build(&mut scene.primitives, LEAF_SIZE);
        Self { scene, bvh }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn bvh_node_count(&self) -> usize {
        self.bvh.node_count()
    }

    pub fn bvh_leaf_count(&self) -> usize {
        self.bvh.leaf_count()
    }

    /// Computes a radiance sample along a light path at a single wavelength
    /// by iterating bounces with Russian-roulette termination.
    ///
    /// The loop is guaranteed to terminate: reflectance is strictly below 1,
    /// so the continuation probability decays to zero.
    fn radiance(&self, mut ray: Ray, wavelength: f32, rng: &mut SmallRng) -> f32 {
        loop {
            let Some(hit) = self.bvh.intersect(&ray, &self.scene.primitives, false) else {
                // Escaped the scene without reaching a light.
                return 0.0;
            };
            let primitive = &self.scene.primitives[hit.prim];

            let mut point = ray.at(hit.t);
            let incident = ray.direction;
            let normal = primitive.normal(point);

            /* Emitters end the walk; they are assumed not to re-reflect. */
            if let Some(light) = primitive.light {
                return self.scene.lights[light].emittance(
                    &self.scene.distributions,
                    incident,
                    normal,
                    wavelength,
                );
            }

            /* A primitive with neither light nor material absorbs. */
            let Some(material_index) = primitive.material else {
                return 0.0;
            };
            let material = &self.scene.materials[material_index];

            /* Importance-sample the next direction, then evaluate the
             * reflectance with the sampling PDF divided out. */
            let exitant = material.sample(
                &self.scene.distributions,
                &mut point,
                incident,
                normal,
                wavelength,
                rng,
            );
            let mut rho = material.reflectance(
                &self.scene.distributions,
                incident,
                exitant,
                normal,
                wavelength,
                true,
            );

            /* Beer–Lambert attenuation through the medium the segment
             * crossed: inside the primitive when the ray exits through the
             * surface (d·n > 0), outside otherwise. */
            if incident.dot(normal) > 0.0 {
                rho *= (-hit.t * material.e2).exp();
            } else {
                rho *= (-hit.t * material.e1).exp();
            }

            /* Russian roulette with the reflectance as the survival
             * probability keeps the estimator unbiased with unit weight. */
            if rng.gen::<f32>() > rho {
                return 0.0;
            }

            /* Degenerate samples (refraction NaN, zero-length exitant)
             * contribute nothing rather than crash. */
            let length_squared = exitant.length_squared();
            if !length_squared.is_finite() || length_squared < EPSILON {
                return 0.0;
            }
            ray = Ray::new(point, exitant / length_squared.sqrt());
        }
    }

    /// Renders one pixel: `samples` jittered camera rays, each traced
    /// independently at every wavelength of the sampled spectrum, then
    /// folded through the CIE pipeline into linear RGB.
    fn render_pixel(&self, index: usize, rng: &mut SmallRng) -> Vec3 {
        let params = &self.scene.params;
        let x = (index % params.width as usize) as f32;
        let y = (index / params.width as usize) as f32;
        let width = params.width as f32;
        let height = params.height as f32;

        let mut radiance = [0.0f32; WAVELENGTHS];
        for _ in 0..params.samples {
            let jitter_u: f32 = rng.gen();
            let jitter_v: f32 = rng.gen();
            let u = (2.0 * (x + jitter_u - 0.5) / width - 1.0) * (width / height);
            let v = 2.0 * (y + jitter_v - 0.5) / height - 1.0;
            let ray = self.scene.camera.trace(u, v);

            for (w, bucket) in radiance.iter_mut().enumerate() {
                let wavelength = SPECTRUM_START + (w * RESOLUTION) as f32;
                *bucket += self.radiance(ray, wavelength, rng);
            }
        }

        color::spectrum_to_rgb(&radiance, &self.scene.color_system)
            / (params.samples as usize * WAVELENGTHS) as f32
    }

    /// Renders the full image with `threads` workers (0 = all cores) and
    /// applies tonemapping and gamma correction after the parallel phase.
    ///
    /// Work is distributed dynamically at pixel granularity — path lengths
    /// vary by orders of magnitude across a scene, so static partitioning
    /// would starve workers. Each pixel gets an independent random stream
    /// seeded from its index, making the output reproducible byte-for-byte.
    pub fn render(&self, threads: usize) -> (Vec<Vec3>, RenderStats) {
        let params = &self.scene.params;
        let pixel_count = params.pixel_count();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to build worker thread pool");

        let progress = Progress::new(pixel_count);
        let start = Instant::now();

        let mut pixels = vec![Vec3::zero(); pixel_count];
        pool.install(|| {
            pixels.par_iter_mut().enumerate().for_each(|(index, pixel)| {
                let mut rng = SmallRng::seed_from_u64(RNG_SEED.wrapping_mul(index as u64 + 1));
                *pixel = self.render_pixel(index, &mut rng);
                progress.tick();
            });
        });

        let elapsed = start.elapsed();
        progress.finish(elapsed.as_secs_f64());

        /* Single-threaded post passes over the finished buffer. */
        color::tonemap(&mut pixels, &self.scene.color_system);
        for pixel in &mut pixels {
            *pixel = color::gamma_correct(*pixel, &self.scene.color_system);
        }

        let stats = RenderStats {
            total_rays: pixel_count as u64 * params.samples as u64 * WAVELENGTHS as u64,
            elapsed_secs: elapsed.as_secs_f64(),
            width: params.width,
            height: params.height,
            spp: params.samples,
        };
        (pixels, stats)
    }
}

// ─── PPM Output ─────────────────────────────────────────────────────────────

/// Writes the pixel buffer as an ASCII PPM (P3) image, with the elapsed
/// render time recorded in a header comment. Channels are clamped to [0, 1]
/// and quantized to 8 bits; scanlines run top-to-bottom, left-to-right.
pub fn write_ppm(
    path: &str,
    pixels: &[Vec3],
    params: &RenderParams,
    elapsed_secs: u64,
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write!(
        file,
        "P3\n\n# Generated by prisma.\n# Rendered in {}.\n\n{} {} 255\n",
        format_hms(elapsed_secs),
        params.width,
        params.height
    )?;
    for pixel in pixels {
        write!(
            file,
            "{} {} {} ",
            (pixel.x.clamp(0.0, 1.0) * 255.0) as u8,
            (pixel.y.clamp(0.0, 1.0) * 255.0) as u8,
            (pixel.z.clamp(0.0, 1.0) * 255.0) as u8
        )?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "0h00m00s");
        assert_eq!(format_hms(75), "0h01m15s");
        assert_eq!(format_hms(3725), "1h02m05s");
    }
}
