//! Software rasterizer that turns one node's geometry into a small sprite.
//!
//! Every triangle is projected orthographically, scanned over its bounding
//! box and sampled once per pixel center with barycentric coordinates.
//! Sprites are memoized per `RenderableNode`: a tile typically contains
//! thousands of nodes but only a handful of distinct appearances.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI, SQRT_2};
use std::sync::Arc;

use cgmath::{InnerSpace, Matrix3, Vector2};
use image::{Rgba, RgbaImage};

use super::light::decode_light;
use crate::game::{DrawType, NodeDefinition, ParamType2};
use crate::math::{Vec3, dimetric_projection, max_component, rotate_xy, rotate_xz, rotate_yz};
use crate::mesh::{CubeFaces, Model, Vertex, cube_with_hidden_faces};
use crate::raster::{ALPHA_CUTOFF, RenderBuffer};

/// Pixels per node edge.
pub const BASE_RESOLUTION: u32 = 16;
pub const SPRITE_WIDTH: u32 = BASE_RESOLUTION;
/// Extra rows leave room for the bottom corner of a projected cube.
pub const SPRITE_HEIGHT: u32 = BASE_RESOLUTION + BASE_RESOLUTION / 8;

const GAMMA: f64 = 2.2;

/// Everything that influences how a node looks. Equal keys render to
/// identical sprites.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderableNode {
    pub name: Arc<str>,
    /// Light level, 0..=15.
    pub light: u8,
    pub param2: u8,
    pub hidden_faces: CubeFaces,
}

pub struct NodeRasterizer {
    projection: Matrix3<f64>,
    sun_direction: Vec3,
    sun_intensity: f64,
    cache: HashMap<RenderableNode, Arc<RenderBuffer>>,
    rasterized: u64,
}

impl NodeRasterizer {
    pub fn new(projection: Matrix3<f64>) -> Self {
        let sun_direction = Vec3::new(-0.5, 1.0, -0.8).normalize();
        Self {
            projection,
            sun_direction,
            sun_intensity: 0.95 / max_component(sun_direction),
            cache: HashMap::new(),
            rasterized: 0,
        }
    }

    pub fn dimetric() -> Self {
        Self::new(dimetric_projection())
    }

    /// Number of sprites actually rasterized (cache misses).
    pub fn rasterized_count(&self) -> u64 {
        self.rasterized
    }

    pub fn cached_sprites(&self) -> usize {
        self.cache.len()
    }

    /// Sprite for a node, or `None` when there is nothing to draw.
    pub fn render(&mut self, node: &RenderableNode, def: &NodeDefinition) -> Option<Arc<RenderBuffer>> {
        if def.draw_type == DrawType::Airlike || def.textures.is_empty() {
            return None;
        }
        let model = def.model.as_deref()?;

        if let Some(sprite) = self.cache.get(node) {
            return Some(Arc::clone(sprite));
        }

        let sprite = Arc::new(self.rasterize(node, def, model));
        self.cache.insert(node.clone(), Arc::clone(&sprite));
        Some(sprite)
    }

    fn rasterize(&mut self, node: &RenderableNode, def: &NodeDefinition, model: &Model) -> RenderBuffer {
        self.rasterized += 1;
        let mut target = RenderBuffer::new(SPRITE_WIDTH, SPRITE_HEIGHT);

        let liquid;
        let model = if def.draw_type.is_liquid() {
            liquid = cube_with_hidden_faces(node.hidden_faces);
            &liquid
        } else {
            model
        };

        let light = decode_light(node.light);
        let oriented = def.param_type2 == ParamType2::FaceDir;

        for (i, mesh) in model.meshes.iter().enumerate() {
            let texture = def.textures.get(i).map(Arc::as_ref);
            for triangle in mesh.triangles() {
                let triangle = triangle.map(|mut v| {
                    if oriented {
                        v.position = facedir(v.position, node.param2);
                        v.normal = facedir(v.normal, node.param2);
                    }
                    // Node meshes use the opposite handedness on X and Z.
                    v.position.x = -v.position.x;
                    v.position.z = -v.position.z;
                    v
                });
                self.draw_triangle(&mut target, texture, light, &triangle);
            }
        }

        target
    }

    fn draw_triangle(&self, target: &mut RenderBuffer, texture: Option<&RgbaImage>, light: f64, tri: &[Vertex; 3]) {
        let origin = Vector2::new(target.width() as f64 / 2.0, target.height() as f64 / 2.0);
        let scale = BASE_RESOLUTION as f64 * SQRT_2 / 2.0;

        let projected = tri.map(|v| self.projection * v.position);
        let screen = projected.map(|p| Vector2::new(p.x * scale + origin.x, -p.y * scale + origin.y));

        let min_x = screen[0].x.min(screen[1].x).min(screen[2].x);
        let max_x = screen[0].x.max(screen[1].x).max(screen[2].x);
        let min_y = screen[0].y.min(screen[1].y).min(screen[2].y);
        let max_y = screen[0].y.max(screen[1].y).max(screen[2].y);

        let x_start = (min_x.floor() as i64).max(0);
        let x_end = (max_x.floor() as i64 + 1).min(target.width() as i64);
        let y_start = (min_y.floor() as i64).max(0);
        let y_end = (max_y.floor() as i64 + 1).min(target.height() as i64);

        for y in y_start..y_end {
            for x in x_start..x_end {
                let p = Vector2::new(x as f64 + 0.5, y as f64 + 0.5);
                let Some(bary) = barycentric(p, screen[0], screen[1], screen[2]) else {
                    continue;
                };

                let depth = projected[0].z * bary.x + projected[1].z * bary.y + projected[2].z * bary.z;
                let normal = tri[0].normal * bary.x + tri[1].normal * bary.y + tri[2].normal * bary.z;
                let lambert = (normal.dot(self.sun_direction).abs() * 0.8 + 0.2).clamp(0.0, 1.0);
                let lighting = self.sun_intensity * light * lambert;

                let color = match texture {
                    Some(texture) => {
                        let uv = tri[0].texcoord * bary.x + tri[1].texcoord * bary.y + tri[2].texcoord * bary.z;
                        shade(sample(texture, uv), lighting)
                    }
                    None => {
                        let gray = (255.0 * lighting).clamp(0.0, 255.0) as u8;
                        Rgba([gray, gray, gray, 255])
                    }
                };

                if color[3] > ALPHA_CUTOFF {
                    target.put_pixel(x as u32, y as u32, color, depth);
                }
            }
        }
    }
}

/// Barycentric weights of `p` in triangle `abc`, or `None` when `p` lies
/// outside (or on an edge of) the triangle.
fn barycentric(p: Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> Option<Vec3> {
    let u = Vec3::new(c.x - a.x, b.x - a.x, a.x - p.x);
    let v = Vec3::new(c.y - a.y, b.y - a.y, a.y - p.y);
    let w = u.cross(v);
    if w.z == 0.0 {
        return None;
    }
    let bary = Vec3::new(1.0 - (w.x + w.y) / w.z, w.y / w.z, w.x / w.z);
    (bary.x > 0.0 && bary.y > 0.0 && bary.z > 0.0).then_some(bary)
}

/// Nearest-neighbour texel lookup, coordinates clamped to the image.
fn sample(texture: &RgbaImage, uv: Vector2<f64>) -> Rgba<u8> {
    let (w, h) = texture.dimensions();
    let x = ((uv.x * w as f64) as i64).clamp(0, w as i64 - 1) as u32;
    let y = ((uv.y * h as f64) as i64).clamp(0, h as i64 - 1) as u32;
    *texture.get_pixel(x, y)
}

/// Apply lighting in linear space.
fn shade(texel: Rgba<u8>, lighting: f64) -> Rgba<u8> {
    let channel = |c: u8| {
        let linear = (c as f64 / 255.0).powf(GAMMA) * lighting;
        (255.0 * linear.powf(1.0 / GAMMA).clamp(0.0, 1.0)) as u8
    };
    Rgba([channel(texel[0]), channel(texel[1]), channel(texel[2]), texel[3]])
}

/// Orient a vector by a `facedir` param2: the low two bits rotate around
/// the vertical axis, the next three pick which axis points up.
pub fn facedir(v: Vec3, param2: u8) -> Vec3 {
    let axis = (param2 >> 2) & 0x7;
    let dir = param2 & 0x3;

    let v = match dir {
        1 => rotate_xz(v, -FRAC_PI_2),
        2 => rotate_xz(v, PI),
        3 => rotate_xz(v, FRAC_PI_2),
        _ => v,
    };

    match axis {
        1 => rotate_yz(v, FRAC_PI_2),
        2 => rotate_yz(v, -FRAC_PI_2),
        3 => rotate_xy(v, -FRAC_PI_2),
        4 => rotate_xy(v, FRAC_PI_2),
        5 => rotate_xy(v, PI),
        _ => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cube;

    fn red_cube() -> NodeDefinition {
        NodeDefinition {
            draw_type: DrawType::Normal,
            textures: vec![Arc::new(RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]))); 6],
            model: Some(Arc::new(cube())),
            ..Default::default()
        }
    }

    fn key(name: &str, light: u8) -> RenderableNode {
        RenderableNode {
            name: Arc::from(name),
            light,
            param2: 0,
            hidden_faces: CubeFaces::NONE,
        }
    }

    #[test]
    fn test_sprite_cache_hits() {
        let mut nr = NodeRasterizer::dimetric();
        let def = red_cube();

        let a = nr.render(&key("default:brick", 15), &def).unwrap();
        let b = nr.render(&key("default:brick", 15), &def).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(nr.rasterized_count(), 1);

        let c = nr.render(&key("default:brick", 7), &def).unwrap();
        assert_eq!(nr.rasterized_count(), 2);
        assert_ne!(*a, *c);
        assert_eq!(nr.cached_sprites(), 2);
    }

    #[test]
    fn test_nothing_to_draw() {
        let mut nr = NodeRasterizer::dimetric();
        let airlike = NodeDefinition {
            draw_type: DrawType::Airlike,
            ..red_cube()
        };
        let no_model = NodeDefinition { model: None, ..red_cube() };
        let no_textures = NodeDefinition {
            textures: Vec::new(),
            ..red_cube()
        };

        assert!(nr.render(&key("a", 15), &airlike).is_none());
        assert!(nr.render(&key("b", 15), &no_model).is_none());
        assert!(nr.render(&key("c", 15), &no_textures).is_none());
        assert_eq!(nr.rasterized_count(), 0);
    }

    #[test]
    fn test_lit_cube_faces() {
        let mut nr = NodeRasterizer::dimetric();
        let sprite = nr.render(&key("default:brick", 15), &red_cube()).unwrap();

        // Top face at full light saturates; the two visible sides are darker.
        let top = sprite.color.get_pixel(8, 4);
        let left = sprite.color.get_pixel(4, 12);
        let right = sprite.color.get_pixel(12, 12);
        assert_eq!(top, &Rgba([255, 0, 0, 255]));
        assert!(left[0] < top[0] && left[0] > 150, "{:?}", left);
        assert!(right[0] < top[0] && right[0] > left[0], "{:?}", right);
        assert_eq!(left[1], 0);

        // Corners of the sprite stay empty.
        assert_eq!(sprite.color.get_pixel(0, 0)[3], 0);
        assert_eq!(sprite.depth_at(0, 0), f64::INFINITY);
        assert!(sprite.depth_at(8, 4).is_finite());
    }

    #[test]
    fn test_untextured_mesh_is_gray() {
        let mut nr = NodeRasterizer::dimetric();
        let def = NodeDefinition {
            textures: vec![Arc::new(RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255])))],
            ..red_cube()
        };
        let sprite = nr.render(&key("x", 15), &def).unwrap();
        let top = sprite.color.get_pixel(8, 4);
        assert_eq!(top, &Rgba([255, 0, 0, 255]));
        let side = sprite.color.get_pixel(4, 12);
        assert_eq!(side[0], side[1]);
        assert_eq!(side[1], side[2]);
    }

    #[test]
    fn test_liquid_hidden_faces() {
        let mut nr = NodeRasterizer::dimetric();
        let water = NodeDefinition {
            draw_type: DrawType::Liquid,
            ..red_cube()
        };
        let covered = RenderableNode {
            hidden_faces: CubeFaces::TOP | CubeFaces::WEST | CubeFaces::BOTTOM | CubeFaces::SOUTH,
            ..key("default:water_source", 15)
        };
        let sprite = nr.render(&covered, &water).unwrap();
        assert_eq!(sprite.color.get_pixel(8, 2)[3], 0);
        assert_eq!(sprite.color.get_pixel(4, 12)[3], 255);
    }

    #[test]
    fn test_facedir_rotations() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        let close = |a: Vec3, b: Vec3| (a - b).magnitude() < 1e-9;

        assert!(close(facedir(x, 0), x));
        assert!(close(facedir(x, 1), Vec3::new(0.0, 0.0, -1.0)));
        assert!(close(facedir(x, 2), Vec3::new(-1.0, 0.0, 0.0)));
        assert!(close(facedir(x, 3), Vec3::new(0.0, 0.0, 1.0)));
        assert!(close(facedir(y, 1 << 2), Vec3::new(0.0, 0.0, 1.0)));
        assert!(close(facedir(y, 2 << 2), Vec3::new(0.0, 0.0, -1.0)));
        assert!(close(facedir(y, 5 << 2), Vec3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn test_barycentric_inside_and_outside() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(4.0, 0.0);
        let c = Vector2::new(0.0, 4.0);
        let w = barycentric(Vector2::new(1.0, 1.0), a, b, c).unwrap();
        assert!((w.x + w.y + w.z - 1.0).abs() < 1e-12);
        assert!(barycentric(Vector2::new(3.0, 3.0), a, b, c).is_none());
        assert!(barycentric(Vector2::new(1.0, 1.0), a, a, c).is_none());
    }
}
