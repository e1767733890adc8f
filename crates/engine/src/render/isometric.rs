//! Dimetric (2:1 isometric-looking) tile renderer.
//!
//! Node `(x, y, z)` lands at global pixel
//! `(NODE_ORIGIN_X + 8(z - x), NODE_ORIGIN_Y + 4(z + x) - Y_OFFSET_COEF * y)`
//! and zoom-0 tile `(tx, ty)` covers global pixels `[256 tx, 256 (tx + 1))`
//! by `[256 ty, 256 (ty + 1))`. Higher layers move up the screen, so each
//! layer's block window is shifted diagonally to stay under the tile.

use std::f64::consts::SQRT_2;
use std::sync::Arc;

use super::rasterizer::{BASE_RESOLUTION, NodeRasterizer};
use super::{Renderer, TILE_SIZE, View, composite, renderable_node};
use crate::game::Game;
use crate::mesh::CubeFaces;
use crate::raster::RenderBuffer;
use crate::world::World;
use crate::world::neighborhood::BlockNeighborhood;
use crate::world::position::{BLOCK_SIZE, BlockPosition, Bounds, NodePosition, ProjectedRegion, Region, TilePosition};

const RES: i64 = BASE_RESOLUTION as i64;

/// Vertical pixels per node of height: `round(16 (1 + √2) / 4)`.
pub const Y_OFFSET_COEF: i64 = 10;
/// Height of the screen area a single block can cover.
pub const TILE_BLOCK_HEIGHT: i64 = RES / 2 * BLOCK_SIZE - 1 + Y_OFFSET_COEF * BLOCK_SIZE;
/// Sprite origin of node `(0, 0, 0)` of the tile's center block.
pub const NODE_ORIGIN_X: i64 = RES * BLOCK_SIZE / 2 - RES / 2;
pub const NODE_ORIGIN_Y: i64 = TILE_BLOCK_HEIGHT / 2 + RES / 4 + 2;

/// Horizontal half-width of the block window rendered per layer.
const WINDOW: i64 = 3;

const VIEW: View = View {
    back_faces: CubeFaces(CubeFaces::WEST.0 | CubeFaces::BOTTOM.0 | CubeFaces::SOUTH.0),
    front: &[
        (NodePosition::new(1, 0, 0), CubeFaces::EAST),
        (NodePosition::new(0, 1, 0), CubeFaces::TOP),
        (NodePosition::new(0, 0, 1), CubeFaces::NORTH),
    ],
    edge_light: true,
};

pub struct IsometricRenderer {
    rasterizer: NodeRasterizer,
    region: Region,
    game: Arc<Game>,
}

impl IsometricRenderer {
    pub fn new(region: Region, game: Arc<Game>) -> Self {
        Self {
            rasterizer: NodeRasterizer::dimetric(),
            region,
            game,
        }
    }

    fn render_block(&mut self, target: &mut RenderBuffer, hood: &BlockNeighborhood, origin: (i64, i64), depth: f64) {
        let block = hood.center();
        let game = Arc::clone(&self.game);

        // The camera looks from +x +y +z: ascending order paints back to
        // front, so translucent nodes blend over what is behind them.
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

                    let node_origin = (
                        origin.0 + NODE_ORIGIN_X + RES / 2 * (z - x),
                        origin.1 + NODE_ORIGIN_Y + RES / 4 * (z + x) - Y_OFFSET_COEF * y,
                    );
                    let node_depth = depth - (z + x) as f64 / SQRT_2 - 0.5 * y as f64;
                    composite(target, def, sprite.as_deref(), node_origin, node_depth);
                }
            }
        }
    }
}

impl Renderer for IsometricRenderer {
    fn name(&self) -> &'static str {
        "isometric"
    }

    fn render_tile(&mut self, tile: TilePosition, world: &World) -> RenderBuffer {
        let mut target = RenderBuffer::new(TILE_SIZE, TILE_SIZE);

        let center_x = 2 * tile.y - tile.x;
        let center_z = 2 * tile.y + tile.x;
        let first_layer = self.region.y_bounds.min.div_euclid(BLOCK_SIZE);
        let last_layer = self.region.y_bounds.max.div_euclid(BLOCK_SIZE);

        for layer in first_layer..=last_layer {
            // 128 px per diagonal step against 160 px per layer.
            let shift = (5 * layer + 2).div_euclid(4);

            for bz in -WINDOW..=WINDOW {
                for bx in -WINDOW..=WINDOW {
                    let dx = bx + shift;
                    let dz = bz + shift;
                    let pos = BlockPosition::new(center_x + dx, layer, center_z + dz);
                    if !Region::of_block(pos).intersects(&self.region) {
                        continue;
                    }

                    let mut hood = BlockNeighborhood::new(pos);
                    hood.fetch_block(world, BlockPosition::new(0, 0, 0));
                    if !hood.has_block(BlockPosition::new(0, 0, 0)) {
                        continue;
                    }
                    hood.fetch_block(world, BlockPosition::new(1, 0, 0));
                    hood.fetch_block(world, BlockPosition::new(0, 1, 0));
                    hood.fetch_block(world, BlockPosition::new(0, 0, 1));

                    let origin = (
                        RES / 2 * BLOCK_SIZE * (dz - dx),
                        (RES / 4 * (dz + dx) - Y_OFFSET_COEF * layer) * BLOCK_SIZE,
                    );
                    let depth = (-(dz + dx) as f64 / SQRT_2 - 0.5 * layer as f64) * BLOCK_SIZE as f64;
                    self.render_block(&mut target, &hood, origin, depth);
                }
            }
        }

        target
    }

    fn project_region(&self, region: &Region) -> ProjectedRegion {
        let tile = TILE_SIZE as i64;
        let (x, y, z) = (region.x_bounds, region.y_bounds, region.z_bounds);

        let left = NODE_ORIGIN_X + RES / 2 * (z.min - x.max);
        let right = NODE_ORIGIN_X + RES / 2 * (z.max - x.min) + RES - 1;
        let top = NODE_ORIGIN_Y + RES / 4 * (z.min + x.min) - Y_OFFSET_COEF * y.max;
        let bottom = NODE_ORIGIN_Y + RES / 4 * (z.max + x.max) - Y_OFFSET_COEF * y.min + RES + RES / 8 - 1;

        ProjectedRegion::new(
            Bounds::new(left.div_euclid(tile), right.div_euclid(tile)),
            Bounds::new(top.div_euclid(tile), bottom.div_euclid(tile)),
        )
    }

    fn sprites_rasterized(&self) -> u64 {
        self.rasterizer.rasterized_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameDescriptor;
    use crate::game::media::MediaCache;
    use crate::world::backend::MemoryBackend;
    use crate::world::block::{MapBlock, Node};
    use image::{Rgba, RgbaImage};

    fn game() -> Arc<Game> {
        let mut media = MediaCache::new();
        media.insert_image("red.png", RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255])));
        let descriptor: GameDescriptor =
            serde_json::from_str(r#"{"nodes": {"test:red": {"tiles": ["red.png"]}}}"#).unwrap();
        Arc::new(Game::from_descriptor(descriptor, &media))
    }

    fn region(min: i64, max: i64) -> Region {
        Region::new(Bounds::new(min, max), Bounds::new(min, max), Bounds::new(min, max))
    }

    fn world_with(nodes: &[(NodePosition, u8)]) -> World {
        let backend = MemoryBackend::new();
        let mut blocks: std::collections::HashMap<BlockPosition, MapBlock> = std::collections::HashMap::new();
        for &(pos, light) in nodes {
            let block = blocks
                .entry(pos.block())
                .or_insert_with(|| MapBlock::new([(0u16, "air"), (1, "test:red")]));
            let local = pos.local();
            block.set_node(
                local.x as usize,
                local.y as usize,
                local.z as usize,
                Node { id: 1, param1: light, param2: 0 },
            );
        }
        for (pos, block) in &blocks {
            backend.insert_block(*pos, block).unwrap();
        }
        World::new(backend)
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(Y_OFFSET_COEF, (16.0 * (1.0 + SQRT_2) / 4.0).round() as i64);
        assert_eq!(TILE_BLOCK_HEIGHT, 287);
        assert_eq!((NODE_ORIGIN_X, NODE_ORIGIN_Y), (120, 149));
    }

    #[test]
    fn test_single_node_lands_at_origin() {
        let world = world_with(&[(NodePosition::new(0, 0, 0), 15)]);
        let mut renderer = IsometricRenderer::new(region(-64, 64), game());

        let tile = renderer.render_tile(TilePosition::new(0, 0), &world);
        assert!(tile.dirty);
        assert_eq!(tile.color.get_pixel(128, 153), &Rgba([255, 0, 0, 255]));
        assert_eq!(tile.color.get_pixel(10, 10)[3], 0);
        assert_eq!(renderer.sprites_rasterized(), 1);
    }

    #[test]
    fn test_empty_world_tile_is_clean() {
        let world = world_with(&[]);
        let mut renderer = IsometricRenderer::new(region(-64, 64), game());
        let tile = renderer.render_tile(TilePosition::new(3, -2), &world);
        assert!(!tile.dirty);
    }

    #[test]
    fn test_nodes_outside_region_are_skipped() {
        let world = world_with(&[(NodePosition::new(0, 0, 0), 15), (NodePosition::new(5, 0, 0), 15)]);
        let area = Region::new(Bounds::new(3, 64), Bounds::new(-64, 64), Bounds::new(-64, 64));
        let mut renderer = IsometricRenderer::new(area, game());
        let tile = renderer.render_tile(TilePosition::new(0, 0), &world);

        // (5, 0, 0) is inside, drawn 40 px left of (0, 0, 0).
        assert_eq!(tile.color.get_pixel(128, 153)[3], 0);
        assert_eq!(tile.color.get_pixel(88, 173), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_nearer_node_covers_farther_one() {
        // (1, 0, 1) sits directly in front of (0, 0, 0) and 8 px lower.
        let world = world_with(&[(NodePosition::new(0, 0, 0), 15), (NodePosition::new(1, 0, 1), 7)]);
        let mut renderer = IsometricRenderer::new(region(-64, 64), game());
        let tile = renderer.render_tile(TilePosition::new(0, 0), &world);

        let covered = tile.color.get_pixel(128, 161);
        assert!(covered[0] < 255, "{:?}", covered);
        assert_eq!(tile.color.get_pixel(128, 153), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_high_layers_stay_in_window() {
        let pos = NodePosition::new(0, 200, 0);
        let world = world_with(&[(pos, 15)]);
        let mut renderer = IsometricRenderer::new(region(-300, 300), game());

        let projected = renderer.project_region(&Region::new(
            Bounds::new(pos.x, pos.x),
            Bounds::new(pos.y, pos.y),
            Bounds::new(pos.z, pos.z),
        ));
        assert_eq!(projected.tile_count(), 1);
        let tile = projected.positions().next().unwrap();
        assert!(renderer.render_tile(tile, &world).dirty);
    }

    #[test]
    fn test_projection_covers_every_node() {
        let renderer = IsometricRenderer::new(region(-64, 64), game());
        let area = Region::new(Bounds::new(-40, 25), Bounds::new(-20, 70), Bounds::new(-33, 18));
        let projected = renderer.project_region(&area);

        for &(x, y, z) in &[(-40, -20, -33), (25, 70, 18), (-40, 70, 18), (25, -20, -33), (0, 0, 0)] {
            let gx = NODE_ORIGIN_X + 8 * (z - x);
            let gy = NODE_ORIGIN_Y + 4 * (z + x) - Y_OFFSET_COEF * y;
            for (px, py) in [(gx, gy), (gx + 15, gy + 17)] {
                let tile = TilePosition::new(px.div_euclid(256), py.div_euclid(256));
                assert!(projected.contains(tile), "{:?} not in {:?}", tile, projected);
            }
        }
    }
}
