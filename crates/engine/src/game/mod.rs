//! Node definitions for the game being rendered.

pub mod media;
pub mod node;

use std::collections::HashMap;

use serde::Deserialize;

use media::MediaCache;
pub use node::{DrawType, NodeBox, NodeDefinition, NodeDescriptor, ParamType, ParamType2, resolve};

/// Node dump exported by the game: `{ "aliases": {...}, "nodes": {...} }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameDescriptor {
    pub aliases: HashMap<String, String>,
    pub nodes: HashMap<String, NodeDescriptor>,
}

/// Resolved node definitions. Immutable once built and shared read-only by
/// every render worker.
#[derive(Debug)]
pub struct Game {
    aliases: HashMap<String, String>,
    nodes: HashMap<String, NodeDefinition>,
    unknown: NodeDefinition,
}

impl Game {
    pub fn new(
        aliases: HashMap<String, String>,
        nodes: HashMap<String, NodeDefinition>,
        media: &MediaCache,
    ) -> Self {
        Self {
            aliases,
            nodes,
            unknown: NodeDefinition {
                draw_type: DrawType::Normal,
                textures: vec![media.placeholder()],
                ..Default::default()
            },
        }
    }

    /// Resolve every descriptor against the loaded media.
    pub fn from_descriptor(descriptor: GameDescriptor, media: &MediaCache) -> Self {
        let nodes = descriptor
            .nodes
            .iter()
            .map(|(name, desc)| (name.clone(), resolve(desc, media)))
            .collect();
        Self::new(descriptor.aliases, nodes, media)
    }

    /// Definition for a node name, following one alias hop. Unregistered
    /// names get the placeholder definition.
    pub fn lookup(&self, name: &str) -> &NodeDefinition {
        if let Some(def) = self.nodes.get(name) {
            return def;
        }
        self.aliases
            .get(name)
            .and_then(|target| self.nodes.get(target))
            .unwrap_or(&self.unknown)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
