//! Node descriptors as dumped by the game, and their resolution into
//! renderable definitions.

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Deserializer};

use super::media::MediaCache;
use crate::math::Vec3;
use crate::mesh::{Model, cube, cuboid};

// ── Enumerations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DrawType {
    #[default]
    Normal,
    Airlike,
    Liquid,
    FlowingLiquid,
    Glasslike,
    GlasslikeFramed,
    AllFaces,
    Torchlike,
    Signlike,
    Firelike,
    Fencelike,
    Raillike,
    NodeBox,
    Mesh,
    PlantlikeRooted,
}

impl DrawType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "normal" | "node" => DrawType::Normal,
            "airlike" => DrawType::Airlike,
            "liquid" => DrawType::Liquid,
            "flowingliquid" => DrawType::FlowingLiquid,
            "glasslike" => DrawType::Glasslike,
            "glasslike_framed" | "glasslike_framed_optional" => DrawType::GlasslikeFramed,
            // Plants are drawn as full cubes until crossed quads are supported.
            "allfaces" | "allfaces_optional" | "plantlike" => DrawType::AllFaces,
            "torchlike" => DrawType::Torchlike,
            "signlike" => DrawType::Signlike,
            "firelike" => DrawType::Firelike,
            "fencelike" => DrawType::Fencelike,
            "raillike" => DrawType::Raillike,
            "nodebox" => DrawType::NodeBox,
            "mesh" => DrawType::Mesh,
            "plantlike_rooted" => DrawType::PlantlikeRooted,
            _ => return None,
        })
    }

    pub fn is_liquid(self) -> bool {
        matches!(self, DrawType::Liquid | DrawType::FlowingLiquid)
    }

    /// Draw types rendered as a full unit cube.
    pub fn is_cuboid(self) -> bool {
        matches!(
            self,
            DrawType::Normal
                | DrawType::AllFaces
                | DrawType::Liquid
                | DrawType::FlowingLiquid
                | DrawType::Glasslike
                | DrawType::GlasslikeFramed
        )
    }
}

impl TryFrom<String> for DrawType {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::from_name(&name).ok_or_else(|| format!("invalid drawtype `{}`", name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ParamType {
    #[default]
    Light,
    None,
}

impl TryFrom<String> for ParamType {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        match name.as_str() {
            "light" => Ok(ParamType::Light),
            "none" => Ok(ParamType::None),
            _ => Err(format!("invalid paramtype `{}`", name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ParamType2 {
    FlowingLiquid,
    WallMounted,
    FaceDir,
    Leveled,
    DegRotate,
    MeshOptions,
    Color,
    ColorFaceDir,
    ColorWallMounted,
    GlasslikeLiquidLevel,
    ColorDegRotate,
    Waving,
    #[default]
    None,
}

impl TryFrom<String> for ParamType2 {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Ok(match name.as_str() {
            "flowingliquid" => ParamType2::FlowingLiquid,
            "wallmounted" => ParamType2::WallMounted,
            "facedir" => ParamType2::FaceDir,
            "leveled" => ParamType2::Leveled,
            "degrotate" => ParamType2::DegRotate,
            "meshoptions" => ParamType2::MeshOptions,
            "color" => ParamType2::Color,
            "colorfacedir" => ParamType2::ColorFaceDir,
            "colorwallmounted" => ParamType2::ColorWallMounted,
            "glasslikeliquidlevel" => ParamType2::GlasslikeLiquidLevel,
            "colordegrotate" => ParamType2::ColorDegRotate,
            "waving" => ParamType2::Waving,
            "none" => ParamType2::None,
            _ => return Err(format!("invalid paramtype2 `{}`", name)),
        })
    }
}

// ── Descriptors ─────────────────────────────────────────────────────────────

/// Box list of a `nodebox` node. Only `type = "fixed"` boxes are kept; each
/// box is `[x1, y1, z1, x2, y2, z2]` in node units.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawNodeBox")]
pub struct NodeBox {
    pub fixed: Vec<[f64; 6]>,
}

#[derive(Deserialize)]
struct RawNodeBox {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    fixed: Option<RawBoxes>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBoxes {
    One(Vec<f64>),
    Many(Vec<Vec<f64>>),
}

fn to_box(values: &[f64]) -> Option<[f64; 6]> {
    values.get(..6)?.try_into().ok()
}

impl From<RawNodeBox> for NodeBox {
    fn from(raw: RawNodeBox) -> Self {
        if raw.kind != "fixed" {
            return NodeBox::default();
        }
        let fixed = match raw.fixed {
            Some(RawBoxes::One(values)) => to_box(&values).into_iter().collect(),
            Some(RawBoxes::Many(boxes)) => boxes.iter().filter_map(|b| to_box(b)).collect(),
            None => Vec::new(),
        };
        NodeBox { fixed }
    }
}

/// Tiles are dumped either as plain texture names or as tables with a `name`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TileSpec {
    Name(String),
    Table { name: String },
}

fn tile_names<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let specs = Vec::<TileSpec>::deserialize(deserializer)?;
    Ok(specs
        .into_iter()
        .map(|spec| match spec {
            TileSpec::Name(name) | TileSpec::Table { name } => name,
        })
        .collect())
}

/// One node entry of the game's node dump.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeDescriptor {
    #[serde(rename = "drawtype")]
    pub draw_type: DrawType,
    #[serde(rename = "paramtype")]
    pub param_type: ParamType,
    #[serde(rename = "paramtype2")]
    pub param_type2: ParamType2,
    #[serde(deserialize_with = "tile_names")]
    pub tiles: Vec<String>,
    pub node_box: Option<NodeBox>,
    pub mesh: Option<String>,
}

// ── Definitions ─────────────────────────────────────────────────────────────

/// Renderable form of a node type: geometry plus one texture per mesh.
#[derive(Debug, Clone, Default)]
pub struct NodeDefinition {
    pub draw_type: DrawType,
    pub param_type: ParamType,
    pub param_type2: ParamType2,
    pub textures: Vec<Arc<RgbaImage>>,
    pub model: Option<Arc<Model>>,
}

/// Expand `tiles` to `slots` entries, repeating the last tile for missing
/// ones. No tiles yields no textures.
fn fill_forward(tiles: &[Arc<RgbaImage>], slots: usize) -> Vec<Arc<RgbaImage>> {
    match tiles.last() {
        Some(last) => (0..slots)
            .map(|i| Arc::clone(tiles.get(i).unwrap_or(last)))
            .collect(),
        None => Vec::new(),
    }
}

/// Build the definition for a descriptor, loading textures and meshes from
/// `media`. Draw types without supported geometry get no model.
pub fn resolve(descriptor: &NodeDescriptor, media: &MediaCache) -> NodeDefinition {
    let tiles: Vec<Arc<RgbaImage>> = descriptor.tiles.iter().map(|name| media.image(name)).collect();

    let (textures, model) = match descriptor.draw_type {
        t if t.is_cuboid() => (fill_forward(&tiles, 6), Some(Arc::new(cube()))),
        DrawType::NodeBox => match &descriptor.node_box {
            Some(node_box) if !node_box.fixed.is_empty() => {
                let meshes = node_box
                    .fixed
                    .iter()
                    .flat_map(|b| cuboid(Vec3::new(b[0], b[1], b[2]), Vec3::new(b[3], b[4], b[5])))
                    .collect();
                let per_box = fill_forward(&tiles, 6);
                let textures: Vec<_> = node_box.fixed.iter().flat_map(|_| per_box.iter().cloned()).collect();
                (textures, Some(Arc::new(Model::new(meshes))))
            }
            _ => (Vec::new(), None),
        },
        DrawType::Mesh => match descriptor.mesh.as_deref().and_then(|name| media.model(name)) {
            Some(model) => (fill_forward(&tiles, model.meshes.len()), Some(model)),
            None => (Vec::new(), None),
        },
        _ => (Vec::new(), None),
    };

    NodeDefinition {
        draw_type: descriptor.draw_type,
        param_type: descriptor.param_type,
        param_type2: descriptor.param_type2,
        textures,
        model,
    }
}
