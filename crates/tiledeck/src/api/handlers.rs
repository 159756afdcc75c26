//! API request handlers.

use std::path::Path as FsPath;
use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::config::{
    Config, Detected, Launcher, MergeOptions, Profile, autodetect_launchers, is_builtin_tile_id,
    merge_with_defaults,
};
use crate::exec::{LaunchPlan, plan_action, plan_tile};
use crate::programs::{self, CatalogLookup, ProgramEntry};
use crate::text;
use crate::tiles::{NamedAction, SanitizeContext, Tile, sanitize_custom_tile, visible_tiles};

const MAX_INPUT: usize = 1024;
const DEFAULT_PROGRAM_LIMIT: usize = 50;
const MAX_PROGRAM_LIMIT: usize = 200;

/// Top-level settings a client may change through `POST /api/settings`.
const EDITABLE_SETTINGS: [&str; 6] = ["host", "port", "workspaceDir", "rateLimit", "logging", "wow"];

/// Persist after a mutation. The in-memory change is kept either way.
async fn persist(state: &AppState) -> ApiResult<()> {
    state.store.persist().await.map_err(|err| {
        warn!(path = %state.store.path().display(), error = %err, "config write failed");
        ApiError::from(err)
    })
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub ok: bool,
    pub config: Config,
}

pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    let config = state.store.read(Config::redacted).await;
    Json(SettingsResponse { ok: true, config })
}

/// Recursively overlay `patch` onto `target`, object by object.
fn overlay(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                overlay(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Validate the patch and rewrite fields into the shape the merge accepts,
/// so a value that passes here is never dropped by `merge_with_defaults`.
fn normalize_settings_patch(patch: &mut serde_json::Map<String, Value>) -> ApiResult<()> {
    if let Some(port) = patch.get_mut("port") {
        let parsed = port
            .as_u64()
            .or_else(|| port.as_str().and_then(|s| s.trim().parse().ok()))
            .filter(|p| (1..=65_535).contains(p))
            .ok_or_else(|| ApiError::bad_request("port must be an integer in 1-65535"))?;
        *port = Value::from(parsed);
    }
    if let Some(dir) = patch.get_mut("workspaceDir") {
        let expanded = dir
            .as_str()
            .map(|d| text::expand_and_unquote(&text::clean(d, MAX_INPUT)))
            .filter(|d| text::looks_absolute(d))
            .ok_or_else(|| ApiError::bad_request("workspaceDir must be an absolute path"))?;
        *dir = Value::String(expanded);
    }
    Ok(())
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SettingsResponse>> {
    let Some(body) = body.as_object() else {
        return Err(ApiError::bad_request("expected a JSON object"));
    };
    let mut patch: serde_json::Map<String, Value> = body
        .iter()
        .filter(|(key, _)| EDITABLE_SETTINGS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    normalize_settings_patch(&mut patch)?;
    let patch = Value::Object(patch);

    let config = state
        .store
        .mutate(|current| {
            let mut raw = serde_json::to_value(&*current)
                .map_err(|e| ApiError::internal(format!("serializing config: {e}")))?;
            overlay(&mut raw, &patch);
            *current = merge_with_defaults(&raw, MergeOptions { autodetect: false });
            Ok::<_, ApiError>(current.redacted())
        })
        .await?;
    info!(keys = ?body.keys().collect::<Vec<_>>(), "settings updated");
    persist(&state).await?;
    Ok(Json(SettingsResponse { ok: true, config }))
}

#[derive(Debug, Deserialize)]
pub struct LauncherRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct LauncherResponse {
    pub ok: bool,
    pub id: String,
    pub launcher: Launcher,
}

pub async fn set_launcher(
    State(state): State<AppState>,
    Json(req): Json<LauncherRequest>,
) -> ApiResult<Json<LauncherResponse>> {
    let id = text::clean(&req.id, 64);
    let path = text::strip_wrapping_quotes(&text::clean(&req.path, MAX_INPUT)).to_string();

    if !state.store.read(|c| c.launchers.contains_key(&id)).await {
        return Err(ApiError::not_found(format!("unknown launcher '{id}'")));
    }
    if !path.is_empty() {
        let expanded = text::expand_and_unquote(&path);
        if !FsPath::new(&expanded).is_file() {
            return Err(ApiError::bad_request(format!("file not found: {expanded}")));
        }
    }

    let launcher = state
        .store
        .mutate(|c| {
            c.launchers.get_mut(&id).map(|launcher| {
                launcher.path = path;
                launcher.clone()
            })
        })
        .await
        .ok_or_else(|| ApiError::not_found(format!("unknown launcher '{id}'")))?;
    state.programs.invalidate();
    info!(launcher = %id, path = %launcher.path, "launcher path updated");
    persist(&state).await?;

    Ok(Json(LauncherResponse {
        ok: true,
        id,
        launcher,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutodetectRequest {
    #[serde(default)]
    pub launcher_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AutodetectResponse {
    pub ok: bool,
    pub detected: Vec<Detected>,
}

pub async fn autodetect(
    State(state): State<AppState>,
    body: Option<Json<AutodetectRequest>>,
) -> ApiResult<Json<AutodetectResponse>> {
    let only = body
        .and_then(|Json(req)| req.launcher_id)
        .map(|id| text::clean(&id, 64))
        .filter(|id| !id.is_empty());

    if let Some(id) = &only
        && !state.store.read(|c| c.launchers.contains_key(id)).await
    {
        return Err(ApiError::not_found(format!("unknown launcher '{id}'")));
    }

    let detected = state
        .store
        .mutate(|c| autodetect_launchers(c, only.as_deref()))
        .await;
    if !detected.is_empty() {
        info!(count = detected.len(), "launchers autodetected");
        state.programs.invalidate();
        persist(&state).await?;
    }
    Ok(Json(AutodetectResponse { ok: true, detected }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TilesQuery {
    pub profile: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TilesResponse {
    pub ok: bool,
    pub tiles: Vec<Tile>,
    pub profiles: Vec<Profile>,
    pub wow_running: bool,
}

pub async fn list_tiles(
    State(state): State<AppState>,
    Query(query): Query<TilesQuery>,
) -> Json<TilesResponse> {
    let process_name = state.store.read(|c| c.wow.process_name.clone()).await;
    let wow_running = state.processes.is_running(&process_name).await;
    let profile = query.profile.filter(|p| !p.is_empty());
    let page = query.page.filter(|p| !p.is_empty());

    let (tiles, profiles) = state
        .store
        .read(|c| {
            let tiles: Vec<Tile> = visible_tiles(c, wow_running, profile.as_deref(), page.as_deref())
                .into_iter()
                .cloned()
                .collect();
            (tiles, c.profiles.clone())
        })
        .await;

    Json(TilesResponse {
        ok: true,
        tiles,
        profiles,
        wow_running,
    })
}

#[derive(Debug, Serialize)]
pub struct TileResponse {
    pub ok: bool,
    pub tile: Tile,
}

pub async fn get_tile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TileResponse>> {
    state
        .store
        .read(|c| c.tile(&id).cloned())
        .await
        .map(|tile| Json(TileResponse { ok: true, tile }))
        .ok_or_else(|| ApiError::not_found(format!("tile '{id}' not found")))
}

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    #[serde(default)]
    pub tile: Value,
}

pub async fn upsert_tile(
    State(state): State<AppState>,
    Json(req): Json<UpsertRequest>,
) -> ApiResult<Json<TileResponse>> {
    if !req.tile.is_object() {
        return Err(ApiError::bad_request("tile must be an object"));
    }

    let config = state.store.snapshot().await;
    let catalog = state.programs.clone();
    let tile = tokio::task::spawn_blocking(move || {
        let id = text::clean_value(req.tile.get("id"), 64).unwrap_or_default();
        let existing = config.tile(&id).cloned();
        let lookup = CatalogLookup::new(&catalog, &config.launchers);
        let ctx = SanitizeContext {
            config: &config,
            programs: &lookup,
        };
        sanitize_custom_tile(&req.tile, existing.as_ref(), &ctx)
    })
    .await
    .map_err(|e| ApiError::internal(format!("tile validation task failed: {e}")))??;

    let stored = tile.clone();
    let replaced = state
        .store
        .mutate(move |c| match c.tiles.iter().position(|t| t.id == stored.id) {
            Some(idx) => {
                c.tiles[idx] = stored;
                true
            }
            None => {
                c.tiles.push(stored);
                false
            }
        })
        .await;
    info!(tile = %tile.id, replaced, "tile saved");
    persist(&state).await?;

    Ok(Json(TileResponse { ok: true, tile }))
}

#[derive(Debug, Deserialize)]
pub struct IdRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub id: String,
}

pub async fn delete_tile(
    State(state): State<AppState>,
    Json(req): Json<IdRequest>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = text::clean(&req.id, 64);
    if id.is_empty() {
        return Err(ApiError::bad_request("id is required"));
    }
    if is_builtin_tile_id(&id) {
        return Err(ApiError::bad_request(format!(
            "built-in tile '{id}' cannot be deleted"
        )));
    }

    let removed = state
        .store
        .mutate(|c| {
            let before = c.tiles.len();
            c.tiles.retain(|t| t.id != id || t.builtin);
            c.tiles.len() != before
        })
        .await;
    if !removed {
        return Err(ApiError::not_found(format!("tile '{id}' not found")));
    }
    info!(tile = %id, "tile deleted");
    persist(&state).await?;
    Ok(Json(DeleteResponse { ok: true, id }))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub ok: bool,
    pub path: String,
}

pub async fn resolve_program(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Json<ResolveResponse>> {
    let input = text::clean(&req.input, MAX_INPUT);
    if input.is_empty() {
        return Err(ApiError::bad_request("input is required"));
    }
    let launchers = state.store.read(|c| c.launchers.clone()).await;
    let index = state.programs.index(&launchers).await;
    let path = programs::resolve_program_path(&input, &index);
    if path.is_empty() {
        return Err(ApiError::not_found(format!(
            "no confident match for '{input}'"
        )));
    }
    Ok(Json(ResolveResponse { ok: true, path }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgramsQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ProgramsResponse {
    pub ok: bool,
    pub total: usize,
    pub programs: Vec<ProgramEntry>,
}

pub async fn list_programs(
    State(state): State<AppState>,
    Query(query): Query<ProgramsQuery>,
) -> Json<ProgramsResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PROGRAM_LIMIT)
        .clamp(1, MAX_PROGRAM_LIMIT);
    let launchers = state.store.read(|c| c.launchers.clone()).await;
    let index = state.programs.index(&launchers).await;
    let programs = programs::search(&index, &text::clean(&query.q, MAX_INPUT), limit)
        .into_iter()
        .cloned()
        .collect();
    Json(ProgramsResponse {
        ok: true,
        total: index.len(),
        programs,
    })
}

pub async fn refresh_programs(State(state): State<AppState>) -> Json<Value> {
    state.programs.invalidate();
    let launchers = state.store.read(|c| c.launchers.clone()).await;
    let count = state.programs.index(&launchers).await.len();
    info!(count, "program index rebuilt");
    Json(json!({ "ok": true, "count": count }))
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub ok: bool,
    pub id: String,
    pub target: String,
    pub plan: LaunchPlan,
}

pub async fn run_tile(
    State(state): State<AppState>,
    Json(req): Json<IdRequest>,
) -> ApiResult<Json<RunResponse>> {
    let id = text::clean(&req.id, 64);
    let config = state.store.snapshot().await;
    let tile = config
        .tile(&id)
        .ok_or_else(|| ApiError::not_found(format!("tile '{id}' not found")))?;

    let plan = plan_tile(tile, &config)?;
    state.spawner.launch(&plan).await?;
    info!(tile = %id, kind = ?tile.tile_type(), target = %plan.target(), "tile launched");

    Ok(Json(RunResponse {
        ok: true,
        id,
        target: plan.target().to_string(),
        plan,
    }))
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub action: NamedAction,
    pub target: String,
}

pub async fn run_action(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    let action = NamedAction::from_str(&name)
        .map_err(|()| ApiError::bad_request(format!("unknown action '{name}'")))?;
    let plan = state.store.read(|c| plan_action(action, c)).await?;
    state.spawner.launch(&plan).await?;
    info!(%action, target = %plan.target(), "action launched");

    Ok(Json(ActionResponse {
        ok: true,
        action,
        target: plan.target().to_string(),
    }))
}
