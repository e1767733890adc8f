//! axum server for the rendered tile pyramid.
//!
//! `GET /tiles/{level}/{x}/{y}` returns the PNG written by the tiler, or
//! 404 when the tile was never written (empty tiles are not saved).
//! `GET /metadata.json` describes the map for the frontend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use voxmap_engine::tile::tile_path;
use voxmap_engine::world::position::TilePosition;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    pub zoom_levels: u32,
    pub renderer: &'static str,
}

pub struct WebState {
    pub tiles_root: PathBuf,
    pub metadata: Metadata,
}

pub fn router(state: Arc<WebState>) -> Router {
    Router::new()
        .route("/tiles/:level/:x/:y", get(tile))
        .route("/metadata.json", get(metadata))
        .with_state(state)
}

/// Bind `listen_address` and serve until the process exits.
pub async fn serve(state: Arc<WebState>, listen_address: &str) -> Result<()> {
    let listener = TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("binding {}", listen_address))?;
    tracing::info!("Serving tiles on http://{}", listen_address);

    axum::serve(listener, router(state)).await.context("tile server")?;
    Ok(())
}

async fn metadata(State(state): State<Arc<WebState>>) -> Json<Metadata> {
    Json(state.metadata.clone())
}

async fn tile(State(state): State<Arc<WebState>>, Path((level, x, y)): Path<(u32, i64, String)>) -> Response {
    let Ok(y) = y.strip_suffix(".png").unwrap_or(&y).parse::<i64>() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if level > state.metadata.zoom_levels {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = tile_path(&state.tiles_root, level, TilePosition::new(x, y));
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::warn!("Failed to read tile {}: {}", path.display(), e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn state(root: &std::path::Path) -> Arc<WebState> {
        Arc::new(WebState {
            tiles_root: root.to_path_buf(),
            metadata: Metadata {
                title: "Test map".into(),
                zoom_levels: 2,
                renderer: "isometric",
            },
        })
    }

    async fn body(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_serves_existing_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = tile_path(dir.path(), 1, TilePosition::new(-3, 4));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"\x89PNG fake").unwrap();

        for y in ["4", "4.png"] {
            let response = tile(State(state(dir.path())), Path((1, -3, y.to_string()))).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
            assert_eq!(body(response).await, b"\x89PNG fake");
        }
    }

    #[tokio::test]
    async fn test_missing_tiles_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let missing = tile(State(Arc::clone(&state)), Path((0, 0, "0.png".into()))).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let garbage = tile(State(Arc::clone(&state)), Path((0, 0, "../etc".into()))).await;
        assert_eq!(garbage.status(), StatusCode::NOT_FOUND);

        let too_deep = tile(State(state), Path((9, 0, "0".into()))).await;
        assert_eq!(too_deep.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metadata_is_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let Json(meta) = metadata(State(state(dir.path()))).await;
        let value = serde_json::to_value(meta).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"title": "Test map", "zoomLevels": 2, "renderer": "isometric"})
        );
    }
}
