use crate::atlas::Atlas;
use crate::config::AppConfig;
use crate::map_view::{ClickOutcome, MapView};
use crate::render;
use crate::types::RegionId;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

/// Shared by every handler. The mutex makes handlers touching map state run
/// one at a time.
pub struct AppState {
    atlas: Mutex<Atlas>,
}

impl AppState {
    pub fn new(atlas: Atlas) -> Self {
        Self {
            atlas: Mutex::new(atlas),
        }
    }

    fn atlas(&self) -> MutexGuard<'_, Atlas> {
        // Transitions are applied without panicking paths; poison carries no torn state.
        self.atlas.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Deserialize)]
pub struct ClickRequest {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
pub struct LocateParams {
    x: f64,
    y: f64,
}

#[derive(Serialize)]
pub struct LocateResponse {
    region: RegionId,
    name: String,
}

#[derive(Serialize)]
pub struct MapSummary {
    id: String,
    title: String,
    regions: usize,
    selection: Option<String>,
    has_flag: bool,
}

#[derive(Serialize)]
pub struct ReferenceResponse {
    reference: String,
}

pub enum ApiError {
    UnknownMap(String),
    NoFlag(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::UnknownMap(id) => {
                (StatusCode::NOT_FOUND, format!("Unknown map '{}'", id)).into_response()
            }
            ApiError::NoFlag(id) => {
                (StatusCode::NOT_FOUND, format!("Map '{}' has no flag", id)).into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

fn with_view<T>(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut MapView) -> T,
) -> Result<T, ApiError> {
    let mut atlas = state.atlas();
    let view = atlas
        .get_mut(id)
        .ok_or_else(|| ApiError::UnknownMap(id.to_string()))?;
    Ok(f(view))
}

fn png(bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes,
    )
        .into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/maps", get(list_handler))
        .route("/api/maps/:id/frame.png", get(frame_handler))
        .route("/api/maps/:id/click", post(click_handler))
        .route("/api/maps/:id/locate", get(locate_handler))
        .route("/api/maps/:id/flag.png", get(flag_handler))
        .route("/api/maps/:id/reference", get(reference_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, atlas: Atlas) -> Result<()> {
    let state = Arc::new(AppState::new(atlas));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    tracing::info!("Starting viewer on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let atlas = state.atlas();
    Html(index_page(&atlas))
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Vec<MapSummary>> {
    let atlas = state.atlas();
    let maps = atlas
        .views()
        .iter()
        .map(|view| MapSummary {
            id: view.id().to_string(),
            title: view.title().to_string(),
            regions: view.store().len(),
            selection: view
                .selection()
                .current()
                .and_then(|id| view.store().get(id))
                .map(|r| r.name.clone()),
            has_flag: view.flag().is_some(),
        })
        .collect();
    Json(maps)
}

async fn frame_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = with_view(&state, &id, |view| render::encode_png(view.frame()))??;
    Ok(png(bytes))
}

async fn click_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(click): Json<ClickRequest>,
) -> Result<Json<ClickOutcome>, ApiError> {
    let outcome = with_view(&state, &id, |view| view.click_pixel(click.x, click.y))?;
    Ok(Json(outcome))
}

async fn locate_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LocateParams>,
) -> Result<Json<Option<LocateResponse>>, ApiError> {
    let found = with_view(&state, &id, |view| {
        view.locate(Point::new(params.x, params.y))
            .and_then(|region| view.store().get(region))
            .map(|r| LocateResponse {
                region: r.id,
                name: r.name.clone(),
            })
    })?;
    Ok(Json(found))
}

async fn flag_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let path = with_view(&state, &id, |view| view.flag().map(|p| p.to_path_buf()))?
        .ok_or_else(|| ApiError::NoFlag(id.clone()))?;

    // Decode outside the atlas lock and off the async workers.
    let bytes = tokio::task::spawn_blocking(move || {
        let flag = render::load_flag(&path)?;
        render::encode_png(&flag)
    })
    .await
    .context("Flag decoding task failed")??;
    Ok(png(bytes))
}

async fn reference_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let reference = with_view(&state, &id, |view| view.map_reference())?;
    Ok(Json(ReferenceResponse { reference }))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn index_page(atlas: &Atlas) -> String {
    let mut tabs = String::new();
    let mut panes = String::new();

    for (i, view) in atlas.views().iter().enumerate() {
        let id = escape_html(view.id());
        let title = escape_html(view.title());
        let active = if i == 0 { " active" } else { "" };

        tabs.push_str(&format!(
            r#"<button class="tab{active}" data-map="{id}">{title}</button>"#
        ));

        let flag = if view.flag().is_some() {
            format!(r#"<img class="flag" src="/api/maps/{id}/flag.png" alt="{title}">"#)
        } else {
            String::new()
        };
        panes.push_str(&format!(
            r#"<section class="pane{active}" id="pane-{id}">{flag}<img class="frame" data-map="{id}" src="/api/maps/{id}/frame.png" alt="{title}"></section>"#
        ));
    }

    INDEX_TEMPLATE
        .replace("{{tabs}}", &tabs)
        .replace("{{panes}}", &panes)
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Region Atlas</title>
<style>
  body { margin: 0; font-family: Helvetica, sans-serif; }
  nav { display: flex; gap: 4px; padding: 6px; background: #eee; }
  .tab { font: bold 14px Helvetica; padding: 5px 10px; border: 1px solid #999; background: #fff; cursor: pointer; }
  .tab.active { background: #ddd; }
  .pane { display: none; position: relative; }
  .pane.active { display: block; }
  .frame { width: 100%; cursor: crosshair; }
  .flag { position: absolute; left: 10px; top: 10px; width: 200px; height: 120px; cursor: pointer; }
</style>
</head>
<body>
<nav>{{tabs}}</nav>
{{panes}}
<script>
  function openReference(url) {
    window.open(url, "_blank", "width=" + screen.availWidth + ",height=" + screen.availHeight + ",left=0,top=0");
  }
  document.querySelectorAll(".tab").forEach(function (tab) {
    tab.addEventListener("click", function () {
      document.querySelectorAll(".tab, .pane").forEach(function (el) { el.classList.remove("active"); });
      tab.classList.add("active");
      document.getElementById("pane-" + tab.dataset.map).classList.add("active");
    });
  });
  document.querySelectorAll(".frame").forEach(function (img) {
    img.addEventListener("click", async function (event) {
      var scale = img.naturalWidth / img.clientWidth;
      var body = JSON.stringify({ x: event.offsetX * scale, y: event.offsetY * scale });
      var res = await fetch("/api/maps/" + img.dataset.map + "/click", {
        method: "POST", headers: { "Content-Type": "application/json" }, body: body
      });
      var outcome = await res.json();
      if (outcome.redrawn) {
        img.src = "/api/maps/" + img.dataset.map + "/frame.png?t=" + Date.now();
      }
      if (outcome.reference) { openReference(outcome.reference); }
    });
  });
  document.querySelectorAll(".flag").forEach(function (flag) {
    flag.addEventListener("click", async function () {
      var map = flag.parentElement.id.replace("pane-", "");
      var res = await fetch("/api/maps/" + map + "/reference");
      openReference((await res.json()).reference);
    });
  });
</script>
</body>
</html>
"#;
