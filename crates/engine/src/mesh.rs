//! Triangle meshes for node geometry.

use std::ops::{BitOr, BitOrAssign};

use cgmath::Vector2;

use crate::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vector2<f64>,
}

/// Triangle list: every three consecutive vertices form one triangle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        self.vertices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Append a quad as two triangles `(a, b, c)` and `(a, d, c)`.
    fn push_quad(&mut self, corners: [([f64; 3], [f64; 2]); 4], normal: [f64; 3]) {
        let normal = Vec3::from(normal);
        let vertex = |(p, uv): ([f64; 3], [f64; 2])| Vertex {
            position: Vec3::from(p),
            normal,
            texcoord: Vector2::from(uv),
        };
        let [a, b, c, d] = corners.map(vertex);
        self.vertices.extend_from_slice(&[a, b, c, a, d, c]);
    }
}

/// A model is a list of meshes, each drawn with its own texture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub meshes: Vec<Mesh>,
}

impl Model {
    pub fn new(meshes: Vec<Mesh>) -> Self {
        Self { meshes }
    }
}

// ── Cube faces ──────────────────────────────────────────────────────────────

/// Set of cuboid faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CubeFaces(pub u8);

impl CubeFaces {
    pub const NONE: CubeFaces = CubeFaces(0);
    pub const TOP: CubeFaces = CubeFaces(1 << 0);
    pub const BOTTOM: CubeFaces = CubeFaces(1 << 1);
    pub const EAST: CubeFaces = CubeFaces(1 << 2);
    pub const WEST: CubeFaces = CubeFaces(1 << 3);
    pub const NORTH: CubeFaces = CubeFaces(1 << 4);
    pub const SOUTH: CubeFaces = CubeFaces(1 << 5);

    /// Order in which `cuboid` emits faces: +y, -y, +x, -x, +z, -z.
    pub const ORDER: [CubeFaces; 6] = [
        Self::TOP,
        Self::BOTTOM,
        Self::EAST,
        Self::WEST,
        Self::NORTH,
        Self::SOUTH,
    ];

    pub const fn contains(self, other: CubeFaces) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CubeFaces {
    type Output = CubeFaces;

    fn bitor(self, rhs: CubeFaces) -> CubeFaces {
        CubeFaces(self.0 | rhs.0)
    }
}

impl BitOrAssign for CubeFaces {
    fn bitor_assign(&mut self, rhs: CubeFaces) {
        self.0 |= rhs.0;
    }
}

// ── Primitives ──────────────────────────────────────────────────────────────

/// Six single-quad meshes for an axis-aligned box, in `CubeFaces::ORDER`.
pub fn cuboid(min: Vec3, max: Vec3) -> Vec<Mesh> {
    let (x1, y1, z1) = (min.x, min.y, min.z);
    let (x2, y2, z2) = (max.x, max.y, max.z);

    let mut top = Mesh::new();
    top.push_quad(
        [
            ([x1, y2, z1], [0.0, 0.0]),
            ([x1, y2, z2], [0.0, 1.0]),
            ([x2, y2, z2], [1.0, 1.0]),
            ([x2, y2, z1], [1.0, 0.0]),
        ],
        [0.0, 1.0, 0.0],
    );

    let mut bottom = Mesh::new();
    bottom.push_quad(
        [
            ([x1, y1, z1], [0.0, 0.0]),
            ([x1, y1, z2], [0.0, 1.0]),
            ([x2, y1, z2], [1.0, 1.0]),
            ([x2, y1, z1], [1.0, 0.0]),
        ],
        [0.0, -1.0, 0.0],
    );

    let mut east = Mesh::new();
    east.push_quad(
        [
            ([x2, y1, z1], [1.0, 1.0]),
            ([x2, y1, z2], [0.0, 1.0]),
            ([x2, y2, z2], [0.0, 0.0]),
            ([x2, y2, z1], [1.0, 0.0]),
        ],
        [1.0, 0.0, 0.0],
    );

    let mut west = Mesh::new();
    west.push_quad(
        [
            ([x1, y1, z1], [1.0, 0.0]),
            ([x1, y1, z2], [0.0, 0.0]),
            ([x1, y2, z2], [0.0, 1.0]),
            ([x1, y2, z1], [1.0, 1.0]),
        ],
        [-1.0, 0.0, 0.0],
    );

    let mut north = Mesh::new();
    north.push_quad(
        [
            ([x1, y1, z2], [0.0, 0.0]),
            ([x1, y2, z2], [0.0, 1.0]),
            ([x2, y2, z2], [1.0, 1.0]),
            ([x2, y1, z2], [1.0, 0.0]),
        ],
        [0.0, 0.0, 1.0],
    );

    let mut south = Mesh::new();
    south.push_quad(
        [
            ([x1, y1, z1], [0.0, 0.0]),
            ([x1, y2, z1], [0.0, 1.0]),
            ([x2, y2, z1], [1.0, 1.0]),
            ([x2, y1, z1], [1.0, 0.0]),
        ],
        [0.0, 0.0, -1.0],
    );

    vec![top, bottom, east, west, north, south]
}

/// Unit cube centered on the origin.
pub fn cube() -> Model {
    cube_with_hidden_faces(CubeFaces::NONE)
}

/// Unit cube with some faces left empty. Hidden faces keep their (empty)
/// mesh so texture indices still line up with `CubeFaces::ORDER`.
pub fn cube_with_hidden_faces(hidden: CubeFaces) -> Model {
    let mut meshes = cuboid(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5));
    for (mesh, face) in meshes.iter_mut().zip(CubeFaces::ORDER) {
        if hidden.contains(face) {
            mesh.vertices.clear();
        }
    }
    Model::new(meshes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    #[test]
    fn test_cuboid_faces_point_outward() {
        let meshes = cuboid(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(meshes.len(), 6);
        for mesh in &meshes {
            assert_eq!(mesh.vertices.len(), 6);
            for tri in mesh.triangles() {
                let center = (tri[0].position + tri[1].position + tri[2].position) / 3.0;
                assert!(center.dot(tri[0].normal) > 0.0);
            }
        }
    }

    #[test]
    fn test_hidden_faces_stay_aligned() {
        let model = cube_with_hidden_faces(CubeFaces::WEST | CubeFaces::BOTTOM | CubeFaces::SOUTH);
        let empty: Vec<bool> = model.meshes.iter().map(Mesh::is_empty).collect();
        assert_eq!(empty, vec![false, true, false, true, false, true]);
        assert_eq!(model.meshes[2].vertices[0].normal, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_face_set_ops() {
        let mut faces = CubeFaces::TOP;
        faces |= CubeFaces::EAST;
        assert!(faces.contains(CubeFaces::TOP));
        assert!(faces.contains(CubeFaces::TOP | CubeFaces::EAST));
        assert!(!faces.contains(CubeFaces::NORTH));
        assert!(faces.contains(CubeFaces::NONE));
    }
}
