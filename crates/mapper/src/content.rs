//! Game content loading: node dump, textures and OBJ meshes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use cgmath::Vector2;
use voxmap_engine::game::media::MediaCache;
use voxmap_engine::game::{Game, GameDescriptor};
use voxmap_engine::math::Vec3;
use voxmap_engine::mesh::{Mesh, Model, Vertex};

pub const NODES_DUMP: &str = "nodes_dump.json";

/// Load node definitions from `{world_path}/nodes_dump.json`, resolving
/// textures and meshes found under `game_path`.
pub fn load_game(world_path: &Path, game_path: &Path) -> Result<Game> {
    let dump_path = world_path.join(NODES_DUMP);
    let text = fs::read_to_string(&dump_path).with_context(|| format!("reading {}", dump_path.display()))?;
    let descriptor: GameDescriptor =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", dump_path.display()))?;

    let media = load_media(game_path)?;
    tracing::info!(
        "Loaded {} textures and {} models from {}",
        media.image_count(),
        media.model_count(),
        game_path.display()
    );

    let game = Game::from_descriptor(descriptor, &media);
    tracing::info!("Resolved {} node definitions", game.node_count());
    Ok(game)
}

/// Collect every `*.png` and `*.obj` below `root`, keyed by file name.
pub fn load_media(root: &Path) -> Result<MediaCache> {
    let mut media = MediaCache::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry.file_type().with_context(|| format!("inspecting {}", path.display()))?;
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            match path.extension().and_then(|e| e.to_str()) {
                Some("png") => match image::open(&path) {
                    Ok(image) => media.insert_image(name, image.into_rgba8()),
                    Err(e) => tracing::warn!("Skipping unreadable texture {}: {}", path.display(), e),
                },
                Some("obj") => {
                    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                    let model = parse_obj(&text).with_context(|| format!("parsing {}", path.display()))?;
                    media.insert_model(name, model);
                }
                _ => {}
            }
        }
    }

    Ok(media)
}

// ── OBJ ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ObjParser {
    positions: Vec<Vec3>,
    texcoords: Vec<Vector2<f64>>,
    normals: Vec<Vec3>,
    meshes: Vec<Mesh>,
    current: Mesh,
}

impl ObjParser {
    fn finish_mesh(&mut self) {
        if !self.current.is_empty() {
            self.meshes.push(std::mem::take(&mut self.current));
        }
    }

    fn line(&mut self, line: &str) -> Result<()> {
        let mut fields = line.split_whitespace();
        let Some(keyword) = fields.next() else {
            return Ok(());
        };
        let args: Vec<&str> = fields.collect();

        match keyword {
            "v" => self.positions.push(Vec3::from(floats::<3>(&args)?)),
            "vt" => self.texcoords.push(Vector2::from(floats::<2>(&args)?)),
            "vn" => self.normals.push(Vec3::from(floats::<3>(&args)?)),
            "f" => self.face(&args)?,
            "g" | "o" | "usemtl" => self.finish_mesh(),
            _ => {}
        }
        Ok(())
    }

    /// Fan-triangulate a polygon of `v`, `v/vt`, `v//vn` or `v/vt/vn` corners.
    fn face(&mut self, corners: &[&str]) -> Result<()> {
        if corners.len() < 3 {
            bail!("face needs at least 3 vertices, got {}", corners.len());
        }
        let vertices = corners.iter().map(|c| self.vertex(c)).collect::<Result<Vec<_>>>()?;
        for i in 2..vertices.len() {
            self.current
                .vertices
                .extend_from_slice(&[vertices[0], vertices[i - 1], vertices[i]]);
        }
        Ok(())
    }

    fn vertex(&self, corner: &str) -> Result<Vertex> {
        let mut parts = corner.splitn(3, '/');
        let position = parts.next().unwrap_or_default();
        let texcoord = parts.next().filter(|s| !s.is_empty());
        let normal = parts.next().filter(|s| !s.is_empty());

        Ok(Vertex {
            position: lookup(&self.positions, position)?,
            texcoord: match texcoord {
                Some(index) => lookup(&self.texcoords, index)?,
                None => Vector2::new(0.0, 0.0),
            },
            normal: match normal {
                Some(index) => lookup(&self.normals, index)?,
                None => Vec3::new(0.0, 0.0, 0.0),
            },
        })
    }
}

fn floats<const N: usize>(args: &[&str]) -> Result<[f64; N]> {
    if args.len() < N {
        bail!("expected {} numbers, found {}", N, args.len());
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.parse().with_context(|| format!("invalid number `{}`", arg))?;
    }
    Ok(out)
}

/// Resolve a 1-based (or negative, counted from the end) OBJ index.
fn lookup<T: Copy>(items: &[T], index: &str) -> Result<T> {
    let i: i64 = index.parse().with_context(|| format!("invalid index `{}`", index))?;
    let resolved = match i {
        i if i > 0 => i - 1,
        i if i < 0 => items.len() as i64 + i,
        _ => bail!("index 0 is not valid"),
    };
    usize::try_from(resolved)
        .ok()
        .and_then(|r| items.get(r).copied())
        .ok_or_else(|| anyhow!("index {} out of range ({} items)", i, items.len()))
}

/// Parse a Wavefront OBJ model. Each group, object or material switch
/// starts a new mesh; empty meshes are dropped.
pub fn parse_obj(text: &str) -> Result<Model> {
    let mut parser = ObjParser::default();
    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        parser.line(line).with_context(|| format!("line {}", number + 1))?;
    }
    parser.finish_mesh();
    Ok(Model::new(parser.meshes))
}
