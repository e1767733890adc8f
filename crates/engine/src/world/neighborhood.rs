//! 3×3×3 window of blocks around a center block.
//!
//! Tile renderers look one node past the edge of the block they draw (for
//! lighting and liquid face culling), so each block is rendered with the
//! neighbors it needs loaded into this fixed array.

use std::sync::{Arc, LazyLock};

use super::World;
use super::block::MapBlock;
use super::position::{BlockPosition, NodePosition};

pub const NEIGHBORHOOD_SLOTS: usize = 27;

/// Name given to content ids missing from a block's mapping table.
pub const UNKNOWN_NODE: &str = "unknown";

static UNKNOWN_NAME: LazyLock<Arc<str>> = LazyLock::new(|| Arc::from(UNKNOWN_NODE));

/// Result of looking up a node through the neighborhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeLookup {
    /// The owning block was never fetched or does not exist.
    Ignore,
    Air { param1: u8 },
    Node { name: Arc<str>, param1: u8, param2: u8 },
}

impl NodeLookup {
    pub fn name(&self) -> &str {
        match self {
            NodeLookup::Ignore => "ignore",
            NodeLookup::Air { .. } => "air",
            NodeLookup::Node { name, .. } => name.as_ref(),
        }
    }

    pub fn param1(&self) -> u8 {
        match self {
            NodeLookup::Ignore => 0,
            NodeLookup::Air { param1 } | NodeLookup::Node { param1, .. } => *param1,
        }
    }

    pub fn param2(&self) -> u8 {
        match self {
            NodeLookup::Node { param2, .. } => *param2,
            _ => 0,
        }
    }
}

/// Slot of a block offset (each component in -1..=1) relative to the center.
#[inline]
fn slot(dx: i64, dy: i64, dz: i64) -> Option<usize> {
    let range = -1..=1;
    if range.contains(&dx) && range.contains(&dy) && range.contains(&dz) {
        Some(((dz + 1) * 9 + (dy + 1) * 3 + (dx + 1)) as usize)
    } else {
        None
    }
}

pub struct BlockNeighborhood {
    center: BlockPosition,
    blocks: [Option<Arc<MapBlock>>; NEIGHBORHOOD_SLOTS],
}

impl BlockNeighborhood {
    pub fn new(center: BlockPosition) -> Self {
        Self {
            center,
            blocks: std::array::from_fn(|_| None),
        }
    }

    pub fn center(&self) -> BlockPosition {
        self.center
    }

    /// Load the block at `center + offset` into its slot. Missing blocks and
    /// blocks that fail to load leave the slot empty.
    pub fn fetch_block(&mut self, world: &World, offset: BlockPosition) {
        let Some(index) = slot(offset.x, offset.y, offset.z) else {
            tracing::warn!("Neighborhood offset {:?} is outside the 3x3x3 window", offset);
            return;
        };
        let pos = self.center.offset(offset);
        self.blocks[index] = match world.get_block(pos) {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!("Treating block ({}, {}, {}) as absent: {}", pos.x, pos.y, pos.z, e);
                None
            }
        };
    }

    /// Place an already decoded block. `offset` is relative to the center.
    pub fn set_block(&mut self, offset: BlockPosition, block: Option<Arc<MapBlock>>) {
        if let Some(index) = slot(offset.x, offset.y, offset.z) {
            self.blocks[index] = block;
        }
    }

    pub fn has_block(&self, offset: BlockPosition) -> bool {
        slot(offset.x, offset.y, offset.z).is_some_and(|i| self.blocks[i].is_some())
    }

    /// Block and block-local coordinates owning a node given relative to the
    /// center block's origin.
    #[inline]
    fn locate(&self, pos: NodePosition) -> Option<(&MapBlock, NodePosition)> {
        let block = pos.block();
        let index = slot(block.x, block.y, block.z)?;
        let map_block = self.blocks[index].as_deref()?;
        Some((map_block, pos.local()))
    }

    /// Look up a node by position relative to the center block's origin.
    pub fn get_node(&self, pos: NodePosition) -> NodeLookup {
        let Some((block, local)) = self.locate(pos) else {
            return NodeLookup::Ignore;
        };
        let node = block.get_node(local.x as usize, local.y as usize, local.z as usize);
        match block.resolve_name(node.id) {
            Some(name) if &**name == "air" => NodeLookup::Air { param1: node.param1 },
            Some(name) => NodeLookup::Node {
                name: Arc::clone(name),
                param1: node.param1,
                param2: node.param2,
            },
            None => NodeLookup::Node {
                name: Arc::clone(&UNKNOWN_NAME),
                param1: node.param1,
                param2: node.param2,
            },
        }
    }

    /// Light byte of a node without resolving its name. Zero when unloaded.
    #[inline]
    pub fn get_param1(&self, pos: NodePosition) -> u8 {
        match self.locate(pos) {
            Some((block, local)) => block.get_param1(local.x as usize, local.y as usize, local.z as usize),
            None => 0,
        }
    }
}
