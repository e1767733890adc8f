//! World storage: `world.mt` metadata and the SQLite block store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use voxmap_engine::world::backend::{Backend, BackendError};
use voxmap_engine::world::position::BlockPosition;

use crate::config::System;

/// Parse `key = value` lines. Blank lines and lines without `=` are ignored.
pub fn parse_world_meta(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

pub fn read_world_meta(path: &Path) -> Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_world_meta(&text))
}

/// Row key of a block in the `blocks` table.
pub fn block_key(pos: BlockPosition) -> i64 {
    pos.z * 0x100_0000 + pos.y * 0x1000 + pos.x
}

/// Read-only view of a `map.sqlite` database.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_context(|| format!("opening {}", path.display()))?;
        let tables: i64 = conn
            .query_row("SELECT count(*) FROM sqlite_master WHERE name = 'blocks'", [], |row| row.get(0))
            .with_context(|| format!("reading schema of {}", path.display()))?;
        if tables == 0 {
            bail!("{} has no blocks table", path.display());
        }
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl Backend for SqliteBackend {
    fn get_block_data(&self, pos: BlockPosition) -> Result<Option<Vec<u8>>, BackendError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn
            .prepare_cached("SELECT data FROM blocks WHERE pos = ?1")
            .map_err(BackendError::new)?;
        stmt.query_row([block_key(pos)], |row| row.get::<_, Vec<u8>>(0))
            .optional()
            .map_err(BackendError::new)
    }
}

/// Open the backend named by `{world_path}/world.mt`.
pub fn open_world_backend(system: &System) -> Result<SqliteBackend> {
    let meta_path = system.world_path.join("world.mt");
    let meta = read_world_meta(&meta_path)?;

    let Some(name) = meta.get("backend") else {
        bail!("{} does not name a backend", meta_path.display());
    };

    match name.as_str() {
        "sqlite3" => {
            let path = match &system.world_dsn {
                Some(dsn) => PathBuf::from(dsn),
                None => system.world_path.join("map.sqlite"),
            };
            tracing::info!("Using SQLite backend at {}", path.display());
            SqliteBackend::open(&path)
        }
        other => bail!("unsupported world backend `{}`", other),
    }
}
