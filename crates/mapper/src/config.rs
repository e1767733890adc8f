//! TOML configuration.
//!
//! ```toml
//! [system]
//! game_path = "/srv/game"
//! world_path = "/srv/worlds/main"
//! tiles_path = "/srv/tiles"
//!
//! [web]
//! listen_address = "0.0.0.0:33333"
//! title = "Voxel map"
//!
//! [renderer]
//! workers = 8
//! zoom_levels = 6
//! kind = "isometric"
//!
//! [region]
//! x_bounds = { min = -1000, max = 1000 }
//! y_bounds = { min = -64, max = 256 }
//! z_bounds = { min = -1000, max = 1000 }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use voxmap_engine::render::RendererKind;
use voxmap_engine::world::position::Region;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: System,
    #[serde(default)]
    pub web: Web,
    #[serde(default)]
    pub renderer: RendererConfig,
    pub region: Region,
}

#[derive(Debug, Clone, Deserialize)]
pub struct System {
    pub game_path: PathBuf,
    pub world_path: PathBuf,
    pub tiles_path: PathBuf,
    /// Overrides the storage location named by `world.mt`.
    #[serde(default)]
    pub world_dsn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Web {
    pub listen_address: String,
    pub title: String,
}

impl Default for Web {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:33333".into(),
            title: "Voxel map".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub workers: usize,
    pub zoom_levels: u32,
    pub kind: RendererKind,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            zoom_levels: 6,
            kind: RendererKind::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("loading config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.renderer.workers == 0 {
            bail!("renderer.workers must be at least 1");
        }
        if !self.region.is_valid() {
            bail!("region bounds must have min <= max on every axis: {:?}", self.region);
        }
        Ok(())
    }
}
