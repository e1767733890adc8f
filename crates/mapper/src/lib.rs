//! Map tile generator: configuration, world storage, game content loading
//! and the tile HTTP server around `voxmap-engine`.

pub mod backend;
pub mod config;
pub mod content;
pub mod web;
