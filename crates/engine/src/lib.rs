//! Voxel map renderer core.
//!
//! Decodes stored map blocks, rasterizes every node type into a cached
//! sprite, composites sprites into depth-tested 256×256 tiles and builds the
//! downscaled zoom pyramid on disk. Storage access goes through the
//! `world::backend::Backend` trait; the mapper binary supplies the concrete
//! database.

pub mod game;
pub mod math;
pub mod mesh;
pub mod raster;
pub mod render;
pub mod tile;
pub mod world;
