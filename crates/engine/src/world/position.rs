use serde::{Deserialize, Serialize};

/// Number of nodes along each axis of a map block.
pub const BLOCK_SIZE: i64 = 16;

/// Absolute node position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodePosition {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl NodePosition {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The block this node belongs to. Floors toward negative infinity.
    pub const fn block(&self) -> BlockPosition {
        BlockPosition::new(
            self.x.div_euclid(BLOCK_SIZE),
            self.y.div_euclid(BLOCK_SIZE),
            self.z.div_euclid(BLOCK_SIZE),
        )
    }

    /// Position within the owning block (0..16 each axis).
    pub const fn local(&self) -> NodePosition {
        NodePosition::new(
            self.x.rem_euclid(BLOCK_SIZE),
            self.y.rem_euclid(BLOCK_SIZE),
            self.z.rem_euclid(BLOCK_SIZE),
        )
    }

    pub const fn add(&self, other: NodePosition) -> NodePosition {
        NodePosition::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

/// Absolute block position (each block is 16x16x16 nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockPosition {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPosition {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Absolute position of a node given in block-local coordinates.
    pub const fn add_node(&self, local: NodePosition) -> NodePosition {
        NodePosition::new(
            self.x * BLOCK_SIZE + local.x,
            self.y * BLOCK_SIZE + local.y,
            self.z * BLOCK_SIZE + local.z,
        )
    }

    pub const fn offset(&self, by: BlockPosition) -> BlockPosition {
        BlockPosition::new(self.x + by.x, self.y + by.y, self.z + by.z)
    }
}

// ── Regions ─────────────────────────────────────────────────────────────────

/// Inclusive integer interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub min: i64,
    pub max: i64,
}

impl Bounds {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub const fn contains(&self, v: i64) -> bool {
        self.min <= v && v <= self.max
    }

    pub const fn overlaps(&self, other: &Bounds) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    pub const fn is_edge(&self, v: i64) -> bool {
        v == self.min || v == self.max
    }

    pub const fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

/// Axis-aligned cuboid of nodes, bounds inclusive on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x_bounds: Bounds,
    pub y_bounds: Bounds,
    pub z_bounds: Bounds,
}

impl Region {
    pub const fn new(x_bounds: Bounds, y_bounds: Bounds, z_bounds: Bounds) -> Self {
        Self {
            x_bounds,
            y_bounds,
            z_bounds,
        }
    }

    /// The 16³ nodes covered by a single block.
    pub const fn of_block(block: BlockPosition) -> Self {
        let min = block.add_node(NodePosition::new(0, 0, 0));
        Self::new(
            Bounds::new(min.x, min.x + BLOCK_SIZE - 1),
            Bounds::new(min.y, min.y + BLOCK_SIZE - 1),
            Bounds::new(min.z, min.z + BLOCK_SIZE - 1),
        )
    }

    pub const fn is_valid(&self) -> bool {
        self.x_bounds.is_valid() && self.y_bounds.is_valid() && self.z_bounds.is_valid()
    }

    pub const fn contains(&self, pos: NodePosition) -> bool {
        self.x_bounds.contains(pos.x) && self.y_bounds.contains(pos.y) && self.z_bounds.contains(pos.z)
    }

    /// Separating-axis test: two cuboids intersect unless some axis separates them.
    pub const fn intersects(&self, other: &Region) -> bool {
        self.x_bounds.overlaps(&other.x_bounds)
            && self.y_bounds.overlaps(&other.y_bounds)
            && self.z_bounds.overlaps(&other.z_bounds)
    }

    /// Whether a node inside the region lies on one of its six faces.
    pub const fn is_at_edge(&self, pos: NodePosition) -> bool {
        self.contains(pos)
            && (self.x_bounds.is_edge(pos.x) || self.y_bounds.is_edge(pos.y) || self.z_bounds.is_edge(pos.z))
    }
}

// ── Tile space ──────────────────────────────────────────────────────────────

/// Index of a tile in a zoom level's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TilePosition {
    pub x: i64,
    pub y: i64,
}

impl TilePosition {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The tile one zoom level coarser that covers this one.
    pub const fn parent(&self) -> TilePosition {
        TilePosition::new(self.x.div_euclid(2), self.y.div_euclid(2))
    }

    /// One of the four finer tiles covered by this one (`qx`, `qy` in 0..2).
    pub const fn child(&self, qx: i64, qy: i64) -> TilePosition {
        TilePosition::new(self.x * 2 + qx, self.y * 2 + qy)
    }
}

/// Rectangle of zoom-0 tiles, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectedRegion {
    pub x_bounds: Bounds,
    pub y_bounds: Bounds,
}

impl ProjectedRegion {
    pub const fn new(x_bounds: Bounds, y_bounds: Bounds) -> Self {
        Self { x_bounds, y_bounds }
    }

    pub const fn contains(&self, tile: TilePosition) -> bool {
        self.x_bounds.contains(tile.x) && self.y_bounds.contains(tile.y)
    }

    pub fn tile_count(&self) -> u64 {
        let width = (self.x_bounds.max - self.x_bounds.min + 1).max(0) as u64;
        let height = (self.y_bounds.max - self.y_bounds.min + 1).max(0) as u64;
        width * height
    }

    /// Every tile in the rectangle, column by column.
    pub fn positions(&self) -> impl Iterator<Item = TilePosition> + use<> {
        let ys = self.y_bounds;
        (self.x_bounds.min..=self.x_bounds.max)
            .flat_map(move |x| (ys.min..=ys.max).map(move |y| TilePosition::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_floors_negative_coordinates() {
        let parents: Vec<i64> = (-3..=3).map(|x| TilePosition::new(x, 0).parent().x).collect();
        assert_eq!(parents, vec![-2, -1, -1, 0, 0, 1, 1]);
    }

    #[test]
    fn test_negative_node_maps_to_previous_block() {
        let pos = NodePosition::new(-1, -16, -17);
        assert_eq!(pos.block(), BlockPosition::new(-1, -1, -2));
        assert_eq!(pos.local(), NodePosition::new(15, 0, 15));
        assert_eq!(pos.block().add_node(pos.local()), pos);
    }

    #[test]
    fn test_region_intersection() {
        let a = Region::new(Bounds::new(0, 15), Bounds::new(0, 15), Bounds::new(0, 15));
        let b = Region::of_block(BlockPosition::new(1, 0, 0));
        let c = Region::of_block(BlockPosition::new(0, 0, 0));
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert_eq!(a, c);
    }

    #[test]
    fn test_region_edge() {
        let r = Region::new(Bounds::new(-4, 4), Bounds::new(0, 10), Bounds::new(-4, 4));
        assert!(r.is_at_edge(NodePosition::new(-4, 5, 0)));
        assert!(r.is_at_edge(NodePosition::new(0, 10, 0)));
        assert!(!r.is_at_edge(NodePosition::new(0, 5, 0)));
        assert!(!r.is_at_edge(NodePosition::new(5, 5, 0)));
    }

    #[test]
    fn test_projected_region_positions() {
        let pr = ProjectedRegion::new(Bounds::new(-1, 0), Bounds::new(2, 4));
        let tiles: Vec<_> = pr.positions().collect();
        assert_eq!(tiles.len() as u64, pr.tile_count());
        assert_eq!(tiles.len(), 6);
        assert!(tiles.iter().all(|t| pr.contains(*t)));
    }
}
