//! Local tile proxy: serves the map page and rendered tiles
//!
//! Tile rendering is blocking (HTTP fetches, PNG encoding) and runs on the
//! runtime's blocking pool. Handlers share only immutable state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use regex::Regex;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::application::services::{TileImage, TileRenderer};
use crate::domain::{MapView, TileCoord};
use crate::infrastructure::error::{InfraError, InfraResult};

/// Tiles at this zoom and deeper are not served.
pub const DEFAULT_MAX_ZOOM: u8 = 16;

/// Shared state of the proxy.
pub struct ProxyState {
    pub renderer: Arc<dyn TileRenderer>,
    pub view: MapView,
    pub max_zoom: u8,
    tile_file: Regex,
}

impl ProxyState {
    pub fn new(renderer: Arc<dyn TileRenderer>, view: MapView, max_zoom: u8) -> InfraResult<Self> {
        let tile_file = Regex::new(r"^([0-9]+)\.png$").map_err(|e| InfraError::Server {
            message: format!("tile pattern: {e}"),
        })?;
        Ok(Self {
            renderer,
            view,
            max_zoom: max_zoom.min(TileCoord::MAX_ZOOM),
            tile_file,
        })
    }

    /// Parse `z`, `x` and `<y>.png` path segments into a servable tile:
    /// digits only, `z < max_zoom`, `x` and `y` inside the zoom's grid.
    pub fn parse_tile(&self, z: &str, x: &str, file: &str) -> Option<TileCoord> {
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(z) || !digits(x) {
            return None;
        }
        let y = self.tile_file.captures(file)?.get(1)?.as_str();
        let z: u8 = z.parse().ok()?;
        if z >= self.max_zoom {
            return None;
        }
        TileCoord::new(z, x.parse().ok()?, y.parse().ok()?).ok()
    }
}

pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
        .route("/style.css", get(style))
        .route("/map.js", get(script))
        .route("/tiles/{z}/{x}/{file}", get(tile))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index(State(state): State<Arc<ProxyState>>) -> Html<String> {
    Html(state.view.index_html())
}

async fn style(State(state): State<Arc<ProxyState>>) -> Response {
    ([(header::CONTENT_TYPE, "text/css")], state.view.style_css()).into_response()
}

async fn script(State(state): State<Arc<ProxyState>>) -> Response {
    match state.view.script() {
        Ok(js) => ([(header::CONTENT_TYPE, "application/javascript")], js).into_response(),
        Err(e) => {
            error!("map script: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn tile(
    State(state): State<Arc<ProxyState>>,
    Path((z, x, file)): Path<(String, String, String)>,
) -> Response {
    let Some(coord) = state.parse_tile(&z, &x, &file) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let renderer = Arc::clone(&state.renderer);
    match tokio::task::spawn_blocking(move || renderer.render(coord)).await {
        Ok(Ok(TileImage::Png(png))) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(Ok(TileImage::Upstream(status))) => StatusCode::from_u16(status)
            .unwrap_or(StatusCode::BAD_GATEWAY)
            .into_response(),
        Ok(Err(e)) => {
            warn!("tile {}: {}", coord, e);
            StatusCode::BAD_GATEWAY.into_response()
        }
        Err(e) => {
            error!("tile {}: render task failed: {}", coord, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve on all interfaces at `port` until the process is stopped.
///
/// Builds its own multi-thread runtime, so call it from synchronous code.
pub fn serve(state: ProxyState, port: u16) -> InfraResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| InfraError::io("start async runtime", e))?;

    runtime.block_on(async move {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| InfraError::io(format!("bind port {port}"), e))?;
        info!(
            "Listening on port {}. Point your browser towards http://localhost:{}/",
            port, port
        );
        axum::serve(listener, router(Arc::new(state)))
            .await
            .map_err(|e| InfraError::Server {
                message: e.to_string(),
            })
    })
}
