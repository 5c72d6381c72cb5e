//! The binary scene description loader.
//!
//! A scene file is a packed little-endian stream: a `{width, height,
//! samples}` header followed by `{type, subtype}`-tagged entity records
//! until EOF. Entities reference earlier entities by index (a material names
//! its reflectance distribution, a primitive its material and light), so the
//! loader validates every index against the arenas parsed so far — forward
//! references are malformed by definition.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

use crate::camera::Camera;
use crate::color::{ColorSystem, COLOR_SYSTEMS, REC709_SYSTEM};
use crate::light::Light;
use crate::material::{Material, MaterialKind};
use crate::math::{Point3, Vec3};
use crate::primitive::Primitive;
use crate::spectrum::Distribution;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Scene loading failures. Malformed data always reports the byte offset at
/// which decoding stopped making sense.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("i/o error reading scene: {0}")]
    Io(#[from] io::Error),

    #[error("invalid scene data at byte offset {offset}: {reason}")]
    InvalidScene { offset: u64, reason: String },
}

// ─── Render Parameters ──────────────────────────────────────────────────────

/// Global render settings from the scene file header.
#[derive(Debug, Clone, Copy)]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
}

impl RenderParams {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

// ─── Scene ──────────────────────────────────────────────────────────────────

/// A fully loaded scene: the arenas every other subsystem indexes into, plus
/// the camera, color system, and render parameters. Immutable for the
/// lifetime of the render (the BVH build reorders `primitives` once, before
/// rendering starts).
pub struct Scene {
    pub params: RenderParams,
    pub color_system: ColorSystem,
    pub camera: Camera,
    pub distributions: Vec<Distribution>,
    pub materials: Vec<Material>,
    pub lights: Vec<Light>,
    pub primitives: Vec<Primitive>,
}

/* Entity type tags. */
const TYPE_COLORSYSTEM: u32 = 0;
const TYPE_CAMERA: u32 = 1;
const TYPE_DISTRIBUTION: u32 = 2;
const TYPE_MATERIAL: u32 = 3;
const TYPE_LIGHT: u32 = 4;
const TYPE_PRIMITIVE: u32 = 5;

impl Scene {
    /// Opens and loads a scene file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let file = File::open(path)?;
        Self::load(BufReader::new(file))
    }

    /// Decodes a scene from any byte stream.
    pub fn load(reader: impl Read) -> Result<Self, SceneError> {
        let mut r = SceneReader::new(reader);

        let width = r.read_i32()?;
        let height = r.read_i32()?;
        let samples = r.read_i32()?;
        if width <= 0 || height <= 0 || samples <= 0 {
            return Err(r.invalid(format!(
                "non-positive render parameters {width}×{height} at {samples} spp"
            )));
        }
        let params = RenderParams {
            width: width as u32,
            height: height as u32,
            samples: samples as u32,
        };

        let mut color_system = REC709_SYSTEM;
        let mut camera = None;
        let mut distributions: Vec<Distribution> = Vec::new();
        let mut materials: Vec<Material> = Vec::new();
        let mut lights: Vec<Light> = Vec::new();
        let mut primitives: Vec<Primitive> = Vec::new();

        while let Some(entity_type) = r.read_record_tag()? {
            let subtype = r.read_u32()?;
            match entity_type {
                TYPE_COLORSYSTEM => {
                    color_system = *COLOR_SYSTEMS.get(subtype as usize).ok_or_else(|| {
                        r.invalid(format!("unknown color system subtype {subtype}"))
                    })?;
                }

                TYPE_CAMERA => match subtype {
                    0 => {
                        let position = r.read_vec3()?;
                        let target = r.read_vec3()?;
                        let fov = r.read_f32()?;
                        camera = Some(Camera::perspective(position, target, fov));
                    }
                    _ => return Err(r.invalid(format!("unknown camera subtype {subtype}"))),
                },

                TYPE_DISTRIBUTION => {
                    let distribution = match subtype {
                        0 => Distribution::BlackBody {
                            temperature: r.read_f32()?,
                        },
                        1 => Distribution::Flat {
                            value: r.read_f32()?,
                        },
                        2 => Distribution::Peak { peak: r.read_f32()? },
                        3 => Distribution::Sellmeier {
                            b: [r.read_f32()?, r.read_f32()?, r.read_f32()?],
                            c: [r.read_f32()?, r.read_f32()?, r.read_f32()?],
                        },
                        _ => {
                            return Err(
                                r.invalid(format!("unknown distribution subtype {subtype}"))
                            )
                        }
                    };
                    distributions.push(distribution);
                }

                TYPE_MATERIAL => {
                    let e1 = r.read_f32()?;
                    let e2 = r.read_f32()?;
                    let kind = match subtype {
                        0 => MaterialKind::Diffuse {
                            reflectance: r.read_distribution_index(&distributions)?,
                        },
                        1 => MaterialKind::Specular {
                            reflectance: r.read_distribution_index(&distributions)?,
                        },
                        2 => MaterialKind::SmoothGlass {
                            refractive_index: r.read_distribution_index(&distributions)?,
                        },
                        3 => MaterialKind::FrostedGlass {
                            refractive_index: r.read_distribution_index(&distributions)?,
                            roughness: r.read_f32()?,
                        },
                        4 => MaterialKind::CookTorrance {
                            reflectance: r.read_distribution_index(&distributions)?,
                            refractive_index: r.read_distribution_index(&distributions)?,
                            roughness: r.read_f32()?,
                        },
                        _ => return Err(r.invalid(format!("unknown material subtype {subtype}"))),
                    };
                    materials.push(Material { e1, e2, kind });
                }

                TYPE_LIGHT => match subtype {
                    0 => {
                        let emittance = r.read_distribution_index(&distributions)?;
                        lights.push(Light::Omni { emittance });
                    }
                    _ => return Err(r.invalid(format!("unknown light subtype {subtype}"))),
                },

                TYPE_PRIMITIVE => {
                    let material = r.read_arena_index(materials.len(), "material")?;
                    let light = r.read_arena_index(lights.len(), "light")?;
                    let primitive = match subtype {
                        0 => {
                            let center = r.read_vec3()?;
                            let radius = r.read_f32()?;
                            Primitive::sphere(center, radius, material, light)
                        }
                        1 => {
                            let p1 = r.read_vec3()?;
                            let p2 = r.read_vec3()?;
                            let p3 = r.read_vec3()?;
                            Primitive::triangle(p1, p2, p3, material, light)
                        }
                        _ => {
                            return Err(r.invalid(format!("unknown primitive subtype {subtype}")))
                        }
                    };
                    primitives.push(primitive);
                }

                _ => return Err(r.invalid(format!("unknown entity type {entity_type}"))),
            }
        }

        let camera = camera.ok_or_else(|| r.invalid("scene defines no camera".to_string()))?;

        Ok(Scene {
            params,
            color_system,
            camera,
            distributions,
            materials,
            lights,
            primitives,
        })
    }
}

// ─── Offset-Tracking Reader ─────────────────────────────────────────────────

/// Wraps a byte stream with a running offset so malformed data can be
/// reported by position. All multi-byte reads are little-endian.
struct SceneReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> SceneReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    fn invalid(&self, reason: String) -> SceneError {
        SceneError::InvalidScene {
            offset: self.offset,
            reason,
        }
    }

    /// Maps a failed payload read: running out of bytes mid-record is
    /// malformed data, not an I/O condition.
    fn payload_error(&self, err: io::Error) -> SceneError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            self.invalid("truncated record".to_string())
        } else {
            SceneError::Io(err)
        }
    }

    fn read_u32(&mut self) -> Result<u32, SceneError> {
        let value = self
            .inner
            .read_u32::<LittleEndian>()
            .map_err(|e| self.payload_error(e))?;
        self.offset += 4;
        Ok(value)
    }

    fn read_i32(&mut self) -> Result<i32, SceneError> {
        let value = self
            .inner
            .read_i32::<LittleEndian>()
            .map_err(|e| self.payload_error(e))?;
        self.offset += 4;
        Ok(value)
    }

    fn read_f32(&mut self) -> Result<f32, SceneError> {
        let value = self
            .inner
            .read_f32::<LittleEndian>()
            .map_err(|e| self.payload_error(e))?;
        self.offset += 4;
        Ok(value)
    }

    fn read_vec3(&mut self) -> Result<Point3, SceneError> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Reads the type tag of the next entity record, or `None` on a clean
    /// EOF at a record boundary. EOF inside the tag is a truncation error.
    fn read_record_tag(&mut self) -> Result<Option<u32>, SceneError> {
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SceneError::Io(e)),
            }
        }
        let mut rest = [0u8; 3];
        self.inner
            .read_exact(&mut rest)
            .map_err(|e| self.payload_error(e))?;
        self.offset += 4;
        Ok(Some(u32::from_le_bytes([
            first[0], rest[0], rest[1], rest[2],
        ])))
    }

    /// Reads a u32 index into the distribution arena, validating range.
    fn read_distribution_index(
        &mut self,
        distributions: &[Distribution],
    ) -> Result<usize, SceneError> {
        let index = self.read_u32()? as usize;
        if index >= distributions.len() {
            return Err(self.invalid(format!(
                "distribution index {index} out of range (have {})",
                distributions.len()
            )));
        }
        Ok(index)
    }

    /// Reads a signed arena index; negative means "none".
    fn read_arena_index(
        &mut self,
        len: usize,
        what: &str,
    ) -> Result<Option<usize>, SceneError> {
        let index = self.read_i32()?;
        if index < 0 {
            return Ok(None);
        }
        let index = index as usize;
        if index >= len {
            return Err(self.invalid(format!("{what} index {index} out of range (have {len})")));
        }
        Ok(Some(index))
    }
}
