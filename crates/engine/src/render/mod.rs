//! Tile renderers.
//!
//! A renderer turns one zoom-0 tile position into a `TILE_SIZE`² buffer by
//! walking the blocks that project onto it and compositing one sprite per
//! node. Each render worker owns its renderer (and therefore its sprite
//! cache); the world and game are shared read-only.

pub mod flat;
pub mod isometric;
pub mod light;
pub mod rasterizer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use flat::FlatRenderer;
pub use isometric::IsometricRenderer;
pub use rasterizer::{NodeRasterizer, RenderableNode};
use rasterizer::{SPRITE_HEIGHT, SPRITE_WIDTH};

use crate::game::{DrawType, Game, NodeDefinition};
use crate::mesh::CubeFaces;
use crate::raster::RenderBuffer;
use crate::world::World;
use crate::world::neighborhood::{BlockNeighborhood, NodeLookup};
use crate::world::position::{NodePosition, ProjectedRegion, Region, TilePosition};
use light::MAP_EDGE_INTENSITY;

/// Edge length of a tile in pixels.
pub const TILE_SIZE: u32 = 256;

pub trait Renderer: Send {
    /// Short identifier, reported through the web metadata.
    fn name(&self) -> &'static str;

    /// Render one zoom-0 tile. The buffer is `dirty` only if at least one
    /// node was composited onto it.
    fn render_tile(&mut self, tile: TilePosition, world: &World) -> RenderBuffer;

    /// Smallest tile rectangle covering every node of `region`.
    fn project_region(&self, region: &Region) -> ProjectedRegion;

    /// Sprites rasterized so far by this renderer (sprite cache misses).
    fn sprites_rasterized(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    Isometric,
    Flat,
}

impl RendererKind {
    pub fn name(self) -> &'static str {
        match self {
            RendererKind::Isometric => "isometric",
            RendererKind::Flat => "flat",
        }
    }

    pub fn create(self, region: Region, game: Arc<Game>) -> Box<dyn Renderer> {
        match self {
            RendererKind::Isometric => Box::new(IsometricRenderer::new(region, game)),
            RendererKind::Flat => Box::new(FlatRenderer::new(region, game)),
        }
    }
}

// ── Shared per-node work ────────────────────────────────────────────────────

/// How a view decides which faces of a node can be seen and how bright it is.
pub(crate) struct View {
    /// Faces of a liquid that always point away from the viewer.
    pub back_faces: CubeFaces,
    /// Neighbors in front of the node and the face each one covers.
    pub front: &'static [(NodePosition, CubeFaces)],
    /// Raise unlit nodes on the region boundary to `MAP_EDGE_INTENSITY`.
    pub edge_light: bool,
}

/// Sprite key and definition for the node at `local` (relative to the
/// neighborhood center's origin), or `None` when there is no node to draw.
pub(crate) fn renderable_node<'g>(
    view: &View,
    game: &'g Game,
    region: &Region,
    hood: &BlockNeighborhood,
    local: NodePosition,
) -> Option<(RenderableNode, &'g NodeDefinition)> {
    let NodeLookup::Node { name, param1, param2 } = hood.get_node(local) else {
        return None;
    };
    let def = game.lookup(&name);

    let liquid = def.draw_type.is_liquid();
    let mut light = param1;
    let mut hidden = if liquid { view.back_faces } else { CubeFaces::NONE };

    for &(offset, face) in view.front {
        let pos = local.add(offset);
        if liquid {
            let neighbor = hood.get_node(pos);
            light = light.max(neighbor.param1());
            if matches!(&neighbor, NodeLookup::Node { name, .. } if game.lookup(name).draw_type.is_liquid()) {
                hidden |= face;
            }
        } else {
            light = light.max(hood.get_param1(pos));
        }
    }

    if view.edge_light && light == 0 {
        let world_pos = hood.center().add_node(local);
        if region.is_at_edge(world_pos) {
            light = MAP_EDGE_INTENSITY;
        }
    }

    let key = RenderableNode {
        name,
        light: light & 0x0F,
        param2,
        hidden_faces: hidden,
    };
    Some((key, def))
}

/// Composite a node sprite. Plain cubes are fully opaque; every other draw
/// type may carry translucent texels. Nodes with nothing to draw, or whose
/// footprint misses the target entirely, leave it untouched.
pub(crate) fn composite(
    target: &mut RenderBuffer,
    def: &NodeDefinition,
    sprite: Option<&RenderBuffer>,
    origin: (i64, i64),
    depth: f64,
) {
    let Some(sprite) = sprite else { return };
    let (x, y) = origin;
    if x >= target.width() as i64
        || y >= target.height() as i64
        || x + SPRITE_WIDTH as i64 <= 0
        || y + SPRITE_HEIGHT as i64 <= 0
    {
        return;
    }

    if def.draw_type == DrawType::Normal {
        target.overlay_opaque(Some(sprite), origin, depth);
    } else {
        target.overlay_alpha(Some(sprite), origin, depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameDescriptor;
    use crate::game::media::MediaCache;
    use crate::world::block::{MapBlock, Node};
    use crate::world::position::{BlockPosition, Bounds};

    const FRONT: &[(NodePosition, CubeFaces)] = &[
        (NodePosition::new(1, 0, 0), CubeFaces::EAST),
        (NodePosition::new(0, 1, 0), CubeFaces::TOP),
        (NodePosition::new(0, 0, 1), CubeFaces::NORTH),
    ];

    fn view(edge_light: bool) -> View {
        View {
            back_faces: CubeFaces::WEST | CubeFaces::BOTTOM | CubeFaces::SOUTH,
            front: FRONT,
            edge_light,
        }
    }

    fn game() -> Game {
        let descriptor: GameDescriptor = serde_json::from_str(
            r#"{"nodes": {
                "default:stone": {"tiles": ["stone.png"]},
                "default:water_source": {"drawtype": "liquid", "tiles": ["water.png"]}
            }}"#,
        )
        .unwrap();
        Game::from_descriptor(descriptor, &MediaCache::new())
    }

    fn hood(block: MapBlock) -> BlockNeighborhood {
        let mut hood = BlockNeighborhood::new(BlockPosition::new(0, 0, 0));
        hood.set_block(BlockPosition::new(0, 0, 0), Some(Arc::new(block)));
        hood
    }

    fn region() -> Region {
        Region::new(Bounds::new(-100, 100), Bounds::new(-100, 100), Bounds::new(-100, 100))
    }

    #[test]
    fn test_light_is_max_of_front_neighbors() {
        let mut block = MapBlock::new([(0u16, "air"), (1, "default:stone")]);
        block.set_node(4, 4, 4, Node { id: 1, param1: 3, param2: 0 });
        block.set_node(4, 5, 4, Node { id: 0, param1: 0xA9, param2: 0 });
        block.set_node(3, 4, 4, Node { id: 0, param1: 15, param2: 0 });

        let game = game();
        let (key, def) = renderable_node(&view(false), &game, &region(), &hood(block), NodePosition::new(4, 4, 4)).unwrap();
        // Full byte compared, low nibble kept; the -x neighbor is behind.
        assert_eq!(key.light, 9);
        assert_eq!(key.hidden_faces, CubeFaces::NONE);
        assert_eq!(def.draw_type, DrawType::Normal);
    }

    #[test]
    fn test_air_and_unloaded_are_skipped() {
        let block = MapBlock::new([(0u16, "air")]);
        let game = game();
        let hood = hood(block);
        assert!(renderable_node(&view(false), &game, &region(), &hood, NodePosition::new(1, 1, 1)).is_none());
        assert!(renderable_node(&view(false), &game, &region(), &hood, NodePosition::new(1, 17, 1)).is_none());
    }

    #[test]
    fn test_liquid_faces_against_liquid_are_hidden() {
        let mut block = MapBlock::new([(0u16, "air"), (1, "default:water_source"), (2, "default:stone")]);
        let water = Node { id: 1, param1: 15, param2: 0 };
        block.set_node(2, 2, 2, water);
        block.set_node(3, 2, 2, water);
        block.set_node(2, 3, 2, Node { id: 2, param1: 0, param2: 0 });

        let game = game();
        let (key, _) = renderable_node(&view(false), &game, &region(), &hood(block), NodePosition::new(2, 2, 2)).unwrap();
        assert_eq!(
            key.hidden_faces,
            CubeFaces::WEST | CubeFaces::BOTTOM | CubeFaces::SOUTH | CubeFaces::EAST
        );
    }

    #[test]
    fn test_unlit_edge_nodes_get_edge_light() {
        let mut block = MapBlock::new([(0u16, "air"), (1, "default:stone")]);
        block.set_node(0, 0, 0, Node { id: 1, param1: 0, param2: 0 });
        block.set_node(5, 5, 5, Node { id: 1, param1: 0, param2: 0 });

        let game = game();
        let hood = hood(block);
        let edge = Region::new(Bounds::new(0, 10), Bounds::new(0, 10), Bounds::new(0, 10));

        let (corner, _) = renderable_node(&view(true), &game, &edge, &hood, NodePosition::new(0, 0, 0)).unwrap();
        assert_eq!(corner.light, MAP_EDGE_INTENSITY);
        let (inner, _) = renderable_node(&view(true), &game, &edge, &hood, NodePosition::new(5, 5, 5)).unwrap();
        assert_eq!(inner.light, 0);
        let (plain, _) = renderable_node(&view(false), &game, &edge, &hood, NodePosition::new(0, 0, 0)).unwrap();
        assert_eq!(plain.light, 0);
    }

    #[test]
    fn test_composite_skips_missing_and_offscreen_sprites() {
        let def = NodeDefinition::default();
        let sprite = RenderBuffer::new(SPRITE_WIDTH, SPRITE_HEIGHT);
        let mut target = RenderBuffer::new(TILE_SIZE, TILE_SIZE);

        composite(&mut target, &def, None, (100, 100), 0.0);
        composite(&mut target, &def, Some(&sprite), (-16, 40), 0.0);
        composite(&mut target, &def, Some(&sprite), (40, 256), 0.0);
        assert!(!target.dirty);

        composite(&mut target, &def, Some(&sprite), (-15, 40), 0.0);
        assert!(target.dirty);
    }

    #[test]
    fn test_kind_names_and_config_values() {
        assert_eq!(RendererKind::default(), RendererKind::Isometric);
        let kind: RendererKind = serde_json::from_str(r#""flat""#).unwrap();
        assert_eq!(kind, RendererKind::Flat);
        let renderer = kind.create(region(), Arc::new(game()));
        assert_eq!(renderer.name(), "flat");
        assert_eq!(RendererKind::Isometric.name(), "isometric");
    }
}
