//! Top-down renderer: one zoom-0 tile per block column, one 16 px square
//! per node.

use std::sync::Arc;

use super::rasterizer::{BASE_RESOLUTION, NodeRasterizer, SPRITE_HEIGHT};
use super::{Renderer, TILE_SIZE, View, composite, renderable_node};
use crate::game::Game;
use crate::math::top_down_projection;
use crate::mesh::CubeFaces;
use crate::raster::RenderBuffer;
use crate::world::World;
use crate::world::neighborhood::BlockNeighborhood;
use crate::world::position::{BLOCK_SIZE, BlockPosition, Bounds, NodePosition, ProjectedRegion, Region, TilePosition};

const RES: i64 = BASE_RESOLUTION as i64;

/// Rows above the node square in a top-down sprite.
const SPRITE_INSET: i64 = (SPRITE_HEIGHT as i64 - RES) / 2;

const VIEW: View = View {
    back_faces: CubeFaces(CubeFaces::WEST.0 | CubeFaces::BOTTOM.0 | CubeFaces::SOUTH.0),
    front: &[(NodePosition::new(0, 1, 0), CubeFaces::TOP)],
    edge_light: false,
};

pub struct FlatRenderer {
    rasterizer: NodeRasterizer,
    region: Region,
    game: Arc<Game>,
}

impl FlatRenderer {
    pub fn new(region: Region, game: Arc<Game>) -> Self {
        Self {
            rasterizer: NodeRasterizer::new(top_down_projection()),
            region,
            game,
        }
    }

    fn render_block(&mut self, target: &mut RenderBuffer, hood: &BlockNeighborhood, depth: f64) {
        let block = hood.center();
        let game = Arc::clone(&self.game);

        for z in 0..BLOCK_SIZE {
            for y in 0..BLOCK_SIZE {
                for x in 0..BLOCK_SIZE {
                    let local = NodePosition::new(x, y, z);
                    if !self.region.contains(block.add_node(local)) {
                        continue;
                    }

                    let Some((key, def)) = renderable_node(&VIEW, &game, &self.region, hood, local) else {
                        continue;
                    };
                    let sprite = self.rasterizer.render(&key, def);
                    let origin = (RES * x, RES * z - SPRITE_INSET);
                    composite(target, def, sprite.as_deref(), origin, depth - y as f64);
                }
            }
        }
    }
}

impl Renderer for FlatRenderer {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn render_tile(&mut self, tile: TilePosition, world: &World) -> RenderBuffer {
        let mut target = RenderBuffer::new(TILE_SIZE, TILE_SIZE);

        let first_layer = self.region.y_bounds.min.div_euclid(BLOCK_SIZE);
        let last_layer = self.region.y_bounds.max.div_euclid(BLOCK_SIZE);

        for layer in first_layer..=last_layer {
            let pos = BlockPosition::new(tile.x, layer, tile.y);
            if !Region::of_block(pos).intersects(&self.region) {
                continue;
            }

            let mut hood = BlockNeighborhood::new(pos);
            hood.fetch_block(world, BlockPosition::new(0, 0, 0));
            if !hood.has_block(BlockPosition::new(0, 0, 0)) {
                continue;
            }
            hood.fetch_block(world, BlockPosition::new(0, 1, 0));

            let depth = -(layer * BLOCK_SIZE) as f64;
            self.render_block(&mut target, &hood, depth);
        }

        target
    }

    fn project_region(&self, region: &Region) -> ProjectedRegion {
        ProjectedRegion::new(
            Bounds::new(
                region.x_bounds.min.div_euclid(BLOCK_SIZE),
                region.x_bounds.max.div_euclid(BLOCK_SIZE),
            ),
            Bounds::new(
                region.z_bounds.min.div_euclid(BLOCK_SIZE),
                region.z_bounds.max.div_euclid(BLOCK_SIZE),
            ),
        )
    }

    fn sprites_rasterized(&self) -> u64 {
        self.rasterizer.rasterized_count()
    }
}
