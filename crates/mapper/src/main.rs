use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use voxmap_engine::tile::Tiler;
use voxmap_engine::world::World;
use voxmap_mapper::backend::open_world_backend;
use voxmap_mapper::config::Config;
use voxmap_mapper::content::load_game;
use voxmap_mapper::web::{self, Metadata, WebState};

/// Render a voxel world into map tiles and serve them.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Render every zoom-0 tile of the configured region, then downscale.
    #[arg(long)]
    fullrender: bool,

    /// Rebuild zoom levels 1.. from the zoom-0 tiles on disk.
    #[arg(long)]
    downscale: bool,

    /// Serve tiles and metadata over HTTP.
    #[arg(long)]
    serve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load(&args.config)?;
    tracing::info!("Loaded config from {}", args.config.display());

    if !(args.fullrender || args.downscale || args.serve) {
        tracing::warn!("Nothing to do: pass --fullrender, --downscale or --serve");
        return Ok(());
    }

    let tiler = Arc::new(Tiler::new(
        config.region,
        config.renderer.zoom_levels,
        config.system.tiles_path.clone(),
    ));

    // ── Offline phases ──────────────────────────────────────────────────
    if args.fullrender || args.downscale {
        let config = config.clone();
        let tiler = Arc::clone(&tiler);
        let fullrender = args.fullrender;
        tokio::task::spawn_blocking(move || run_offline(&config, &tiler, fullrender))
            .await
            .context("render task panicked")??;
    }

    // ── Tile server ─────────────────────────────────────────────────────
    if args.serve {
        let state = Arc::new(WebState {
            tiles_root: config.system.tiles_path.clone(),
            metadata: Metadata {
                title: config.web.title.clone(),
                zoom_levels: config.renderer.zoom_levels,
                renderer: config.renderer.kind.name(),
            },
        });

        tokio::select! {
            result = web::serve(state, &config.web.listen_address) => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
            }
        }
    }

    Ok(())
}

/// Full render (when requested) followed by downscaling.
fn run_offline(config: &Config, tiler: &Tiler, fullrender: bool) -> Result<()> {
    if fullrender {
        let game = Arc::new(load_game(&config.system.world_path, &config.system.game_path)?);
        let world = World::new(open_world_backend(&config.system)?);

        let kind = config.renderer.kind;
        let region = config.region;
        tracing::info!("Starting full render with the {} renderer", kind.name());
        tiler.full_render(&world, config.renderer.workers, || kind.create(region, Arc::clone(&game)))?;
    }

    tiler.downscale_tiles()?;
    let stats = tiler.stats().snapshot();
    tracing::info!(
        "Offline work finished: {}",
        serde_json::to_string(&stats).unwrap_or_default()
    );
    Ok(())
}
