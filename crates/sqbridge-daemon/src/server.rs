//! HTTP request layer.
//!
//! Routes browser requests onto the state store, the single-control service,
//! the sync engine, and the show library. Every error body is `{"error": msg}`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqbridge_core::channel::LOCAL_LINE_PREAMPS;
use sqbridge_core::{
    ChannelState, ConsoleAddress, ControlChange, ControlOutcome, Error, PreampBus, Show,
    StateStore, SyncEngine, SyncStatus, Transport, apply_control,
};
use sqbridge_db::{Database, DbError};
use tracing::{error, info, warn};

use crate::config::ConsoleConfig;

/// Shared application state.
pub struct AppState<T> {
    pub store: Arc<StateStore>,
    pub sync: Arc<SyncEngine<T>>,
    pub transport: Arc<T>,
    pub db: Arc<Mutex<Database>>,
    /// Console host from the config file, used when none was set at runtime
    pub default_host: Option<String>,
    pub console_port: u16,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sync: Arc::clone(&self.sync),
            transport: Arc::clone(&self.transport),
            db: Arc::clone(&self.db),
            default_host: self.default_host.clone(),
            console_port: self.console_port,
        }
    }
}

impl<T: Transport> AppState<T> {
    pub fn new(
        store: Arc<StateStore>,
        transport: Arc<T>,
        db: Arc<Mutex<Database>>,
        console: &ConsoleConfig,
    ) -> Self {
        let sync = Arc::new(SyncEngine::new(Arc::clone(&store), Arc::clone(&transport)));
        Self {
            store,
            sync,
            transport,
            db,
            default_host: console.host.clone().filter(|h| !h.trim().is_empty()),
            console_port: console.port,
        }
    }

    /// Effective console host: the runtime setting wins over the config file.
    fn console_host(&self) -> Result<Option<String>, DbError> {
        let runtime = self.db.lock().console_host()?;
        Ok(runtime.or_else(|| self.default_host.clone()))
    }

    fn console_address(&self) -> Result<Option<ConsoleAddress>, DbError> {
        Ok(self.console_host()?.map(|host| ConsoleAddress::new(host, self.console_port)))
    }
}

/// Build the router with every route bound to `state`.
pub fn router<T: Transport>(state: AppState<T>) -> Router {
    Router::new()
        .route("/api/config", get(get_config::<T>).post(post_config::<T>))
        .route("/api/state", get(get_state::<T>).post(post_state::<T>))
        .route("/api/state/reset", post(reset_state::<T>))
        .route("/api/sync", post(start_sync::<T>))
        .route("/api/sync/status", get(sync_status::<T>))
        .route("/api/shows", get(list_shows::<T>).post(save_show::<T>))
        .route("/api/shows/{name}", get(get_show::<T>).delete(delete_show::<T>))
        .route("/preamp/{bus}/{id}/phantom", post(preamp_phantom::<T>))
        .route("/preamp/{bus}/{id}/pad", post(preamp_pad::<T>))
        .route("/preamp/{bus}/{id}/gain", post(preamp_gain::<T>))
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A failed request: status code plus message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::Validation { .. }
            | Error::InvalidPreamp { .. }
            | Error::InvalidGain(_)
            | Error::ConsoleNotConfigured => StatusCode::BAD_REQUEST,
            Error::SyncInProgress => StatusCode::CONFLICT,
            Error::ShowNotFound(_) => StatusCode::NOT_FOUND,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::BAD_GATEWAY {
            warn!(error = %e, "Console write failed");
        }
        Self { status, message: e.to_string() }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        error!(error = %e, "Database error");
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: e.to_string() }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Config
// =============================================================================

#[derive(Serialize)]
struct ConfigResponse {
    console_host: Option<String>,
    console_port: u16,
}

#[derive(Deserialize)]
struct ConfigUpdate {
    console_host: String,
}

/// GET /api/config - effective console address
async fn get_config<T: Transport>(
    State(state): State<AppState<T>>,
) -> ApiResult<Json<ConfigResponse>> {
    config_response(&state)
}

/// POST /api/config - set the console host at runtime
async fn post_config<T: Transport>(
    State(state): State<AppState<T>>,
    payload: Result<Json<ConfigUpdate>, JsonRejection>,
) -> ApiResult<Json<ConfigResponse>> {
    let Json(update) = payload?;
    state.db.lock().set_console_host(&update.console_host)?;
    info!(host = %update.console_host.trim(), "Console host updated");
    config_response(&state)
}

fn config_response<T: Transport>(state: &AppState<T>) -> ApiResult<Json<ConfigResponse>> {
    let console_host = state.console_host()?;
    Ok(Json(ConfigResponse { console_host, console_port: state.console_port }))
}

// =============================================================================
// State
// =============================================================================

#[derive(Serialize)]
struct StateResponse {
    channels: Vec<ChannelState>,
    current_show: String,
    console_host: Option<String>,
    line_preamp_ids: [i64; 4],
}

#[derive(Deserialize)]
struct StateUpdate {
    channels: Option<Vec<ChannelState>>,
    current_show: Option<String>,
    console_host: Option<String>,
}

fn state_response<T: Transport>(state: &AppState<T>) -> ApiResult<Json<StateResponse>> {
    let snapshot = state.store.snapshot();
    Ok(Json(StateResponse {
        channels: snapshot.channels,
        current_show: snapshot.current_show,
        console_host: state.console_host()?,
        line_preamp_ids: LOCAL_LINE_PREAMPS,
    }))
}

/// GET /api/state - channel mirror and active show
async fn get_state<T: Transport>(
    State(state): State<AppState<T>>,
) -> ApiResult<Json<StateResponse>> {
    state_response(&state)
}

/// POST /api/state - replace the channel list
async fn post_state<T: Transport>(
    State(state): State<AppState<T>>,
    payload: Result<Json<StateUpdate>, JsonRejection>,
) -> ApiResult<Json<StateResponse>> {
    let Json(update) = payload?;
    if let Some(channels) = update.channels {
        state.store.replace(channels)?;
    }
    if let Some(name) = update.current_show {
        state.store.set_current_show(&name);
    }
    if let Some(host) = update.console_host {
        state.db.lock().set_console_host(&host)?;
    }
    state_response(&state)
}

/// POST /api/state/reset - clear the mirror and the active show
async fn reset_state<T: Transport>(
    State(state): State<AppState<T>>,
) -> ApiResult<Json<StateResponse>> {
    state.store.reset();
    state.db.lock().reset_state()?;
    state_response(&state)
}

// =============================================================================
// Sync
// =============================================================================

/// POST /api/sync - push the whole mirror to the console in the background
async fn start_sync<T: Transport>(
    State(state): State<AppState<T>>,
) -> ApiResult<impl IntoResponse> {
    let addr = state.console_address()?.ok_or(Error::ConsoleNotConfigured)?;
    let handle = state.sync.start(addr, &state.store.get())?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "started": true, "total": handle.total }))))
}

/// GET /api/sync/status - progress of the current or last run
async fn sync_status<T: Transport>(State(state): State<AppState<T>>) -> Json<SyncStatus> {
    Json(state.sync.status())
}

// =============================================================================
// Shows
// =============================================================================

#[derive(Deserialize)]
struct ShowUpdate {
    name: String,
    #[serde(default)]
    channels: Vec<ChannelState>,
    #[serde(default)]
    console_host: Option<String>,
    #[serde(default = "default_set_current")]
    set_current: bool,
}

fn default_set_current() -> bool {
    true
}

/// GET /api/shows - saved show names
async fn list_shows<T: Transport>(State(state): State<AppState<T>>) -> ApiResult<Json<Value>> {
    let shows = state.db.lock().list_shows()?;
    Ok(Json(json!({ "shows": shows })))
}

/// GET /api/shows/{name}
async fn get_show<T: Transport>(
    State(state): State<AppState<T>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Show>> {
    let show = state.db.lock().load_show(&name)?;
    Ok(Json(show.ok_or(Error::ShowNotFound(name))?))
}

/// POST /api/shows - save (or overwrite) a show
async fn save_show<T: Transport>(
    State(state): State<AppState<T>>,
    payload: Result<Json<ShowUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(update) = payload?;
    let show = Show {
        name: update.name,
        channels: update.channels,
        console_host: update.console_host.filter(|h| !h.trim().is_empty()),
    };
    let name = state.db.lock().save_show(&show)?;
    if update.set_current {
        state.store.set_current_show(&name);
    }
    info!(name = %name, channels = show.channels.len(), "Show saved");
    Ok(Json(json!({ "name": name, "current": update.set_current })))
}

/// DELETE /api/shows/{name}
async fn delete_show<T: Transport>(
    State(state): State<AppState<T>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.db.lock().delete_show(&name)? {
        return Err(Error::ShowNotFound(name).into());
    }
    if state.store.current_show() == name {
        state.store.set_current_show("");
    }
    info!(name = %name, "Show deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Single-control writes
// =============================================================================

#[derive(Deserialize)]
struct SwitchQuery {
    #[serde(default)]
    on: String,
}

impl SwitchQuery {
    fn is_on(&self) -> bool {
        matches!(self.on.as_str(), "true" | "1")
    }
}

#[derive(Deserialize)]
struct GainQuery {
    db: Option<String>,
}

#[derive(Deserialize)]
struct GainBody {
    db: f64,
}

fn parse_preamp(bus: &str, id: &str) -> ApiResult<(PreampBus, i64)> {
    let bus = PreampBus::parse_lossy(bus);
    let id = id.trim().parse().map_err(|_| {
        ApiError::bad_request(format!("{bus} preamp must be 1-{}", bus.max_preamp()))
    })?;
    Ok((bus, id))
}

const MISSING_GAIN: &str = "missing db (0..60), query ?db=12 or JSON {\"db\": 12}";

/// Gain comes from a JSON body, or from `?db=` otherwise.
fn parse_gain(headers: &HeaderMap, query: &GainQuery, body: &Bytes) -> ApiResult<f64> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    if is_json {
        let body: GainBody = serde_json::from_slice(body)
            .map_err(|_| ApiError::bad_request("invalid json, need {\"db\": 0..60}"))?;
        return Ok(body.db);
    }
    let raw = query
        .db
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request(MISSING_GAIN))?;
    raw.parse().map_err(|_| ApiError::bad_request("db must be number 0..60"))
}

async fn write_control<T: Transport>(
    state: &AppState<T>,
    bus: PreampBus,
    preamp_id: i64,
    change: ControlChange,
) -> ApiResult<bool> {
    let addr = state.console_address()?;
    let outcome =
        apply_control(state.transport.as_ref(), &state.store, addr.as_ref(), bus, preamp_id, change)
            .await?;
    Ok(matches!(outcome, ControlOutcome::Sent { .. }))
}

/// POST /preamp/{bus}/{id}/phantom?on=
async fn preamp_phantom<T: Transport>(
    State(state): State<AppState<T>>,
    Path((bus, id)): Path<(String, String)>,
    Query(query): Query<SwitchQuery>,
) -> ApiResult<Json<Value>> {
    let (bus, id) = parse_preamp(&bus, &id)?;
    let on = query.is_on();
    let sent = write_control(&state, bus, id, ControlChange::Phantom(on)).await?;
    Ok(Json(json!({ "bus": bus, "preamp": id, "phantom": on, "sent": sent })))
}

/// POST /preamp/{bus}/{id}/pad?on=
async fn preamp_pad<T: Transport>(
    State(state): State<AppState<T>>,
    Path((bus, id)): Path<(String, String)>,
    Query(query): Query<SwitchQuery>,
) -> ApiResult<Json<Value>> {
    let (bus, id) = parse_preamp(&bus, &id)?;
    let on = query.is_on();
    let sent = write_control(&state, bus, id, ControlChange::Pad(on)).await?;
    Ok(Json(json!({ "bus": bus, "preamp": id, "pad": on, "sent": sent })))
}

/// POST /preamp/{bus}/{id}/gain
async fn preamp_gain<T: Transport>(
    State(state): State<AppState<T>>,
    Path((bus, id)): Path<(String, String)>,
    Query(query): Query<GainQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let (bus, id) = parse_preamp(&bus, &id)?;
    let db = parse_gain(&headers, &query, &body)?;
    let sent = write_control(&state, bus, id, ControlChange::Gain(db)).await?;
    Ok(Json(json!({ "bus": bus, "preamp": id, "gain_db": db, "sent": sent })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use sqbridge_core::{MemoryTransport, SyncState};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(transport: MemoryTransport, host: Option<&str>) -> AppState<MemoryTransport> {
        let console =
            ConsoleConfig { host: host.map(ToString::to_string), ..ConsoleConfig::default() };
        let db = Database::open_in_memory().unwrap();
        AppState::new(
            Arc::new(StateStore::new()),
            Arc::new(transport),
            Arc::new(Mutex::new(db)),
            &console,
        )
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json =
            if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    fn two_channels() -> Value {
        json!({
            "channels": [
                {
                    "id": 1, "name": "Vox", "preampBus": "local", "preampId": 3,
                    "phantom": true, "pad": false, "gain": 30
                },
                {
                    "id": 2, "name": "Keys", "preampBus": "slink", "preampId": 5, "preampIdR": 6,
                    "phantom": false, "pad": true, "gain": 12
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_empty_state() {
        let app = router(test_state(MemoryTransport::new(), None));
        let (status, body) = call(&app, Method::GET, "/api/state", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"], json!([]));
        assert_eq!(body["current_show"], "");
        assert_eq!(body["console_host"], Value::Null);
        assert_eq!(body["line_preamp_ids"], json!([18, 19, 20, 21]));
    }

    #[tokio::test]
    async fn test_replace_state() {
        let app = router(test_state(MemoryTransport::new(), None));
        let (status, body) = call(&app, Method::POST, "/api/state", Some(two_channels())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"].as_array().unwrap().len(), 2);

        let (_, body) = call(&app, Method::GET, "/api/state", None).await;
        assert_eq!(body["channels"][1]["preampIdR"], 6);
        assert_eq!(body["channels"][1]["preampBus"], "slink");
    }

    #[tokio::test]
    async fn test_invalid_state_rejected_and_kept() {
        let app = router(test_state(MemoryTransport::new(), None));
        call(&app, Method::POST, "/api/state", Some(two_channels())).await;

        let bad =
            json!({ "channels": [{"id": 9, "name": "X", "preampBus": "local", "preampId": 22}] });
        let (status, body) = call(&app, Method::POST, "/api/state", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("channel 9"));

        let (_, body) = call(&app, Method::GET, "/api/state", None).await;
        assert_eq!(body["channels"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_bus_is_bad_request() {
        let app = router(test_state(MemoryTransport::new(), None));
        let bad =
            json!({ "channels": [{"id": 1, "name": "X", "preampBus": "aes", "preampId": 1}] });
        let (status, body) = call(&app, Method::POST, "/api/state", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_runtime_host_wins_over_config() {
        let app = router(test_state(MemoryTransport::new(), Some("10.0.0.1")));
        let (_, body) = call(&app, Method::GET, "/api/config", None).await;
        assert_eq!(body["console_host"], "10.0.0.1");
        assert_eq!(body["console_port"], 51326);

        let update = json!({"console_host": " 10.0.0.2 "});
        let (status, body) = call(&app, Method::POST, "/api/config", Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["console_host"], "10.0.0.2");
    }

    #[tokio::test]
    async fn test_phantom_write_sends_and_mirrors() {
        let state = test_state(MemoryTransport::new(), Some("10.0.0.1"));
        let app = router(state.clone());
        call(&app, Method::POST, "/api/state", Some(two_channels())).await;

        let uri = "/preamp/local/3/phantom?on=false";
        let (status, body) = call(&app, Method::POST, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phantom"], false);
        assert_eq!(body["sent"], true);

        let sent = state.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].as_bytes(), &[0xF7, 0x0C, 0x0C, 0x0D, 0x02, 0x01, 0x00, 0x00]);
        assert!(!state.store.get()[0].phantom);
    }

    #[tokio::test]
    async fn test_pad_on_slink() {
        let state = test_state(MemoryTransport::new(), Some("10.0.0.1"));
        let app = router(state.clone());

        let (status, body) = call(&app, Method::POST, "/preamp/slink/6/pad?on=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bus"], "slink");
        let sent = state.transport.sent();
        assert_eq!(sent[0].as_bytes(), &[0xF7, 0x0C, 0x0C, 0x0E, 0x05, 0x02, 0x01, 0x00]);
    }

    #[tokio::test]
    async fn test_gain_from_query_and_json() {
        let state = test_state(MemoryTransport::new(), Some("10.0.0.1"));
        let app = router(state.clone());

        let (status, _) = call(&app, Method::POST, "/preamp/local/1/gain?db=30", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) =
            call(&app, Method::POST, "/preamp/local/1/gain", Some(json!({"db": 60}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gain_db"], 60.0);

        let sent = state.transport.sent();
        assert_eq!(sent[0].value(), 0x9E);
        assert_eq!(sent[1].value(), 0xBC);
    }

    #[tokio::test]
    async fn test_gain_errors() {
        let state = test_state(MemoryTransport::new(), Some("10.0.0.1"));
        let app = router(state.clone());

        let (status, body) = call(&app, Method::POST, "/preamp/local/1/gain", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("missing db"));

        let (status, _) = call(&app, Method::POST, "/preamp/local/1/gain?db=61", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::POST, "/preamp/local/1/gain?db=loud", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_preamp_out_of_range() {
        let state = test_state(MemoryTransport::new(), Some("10.0.0.1"));
        let app = router(state.clone());

        let (status, _) = call(&app, Method::POST, "/preamp/local/22/phantom?on=1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::POST, "/preamp/slink/41/pad?on=1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::POST, "/preamp/local/abc/pad?on=1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_line_input_needs_no_console() {
        let state = test_state(MemoryTransport::new(), None);
        let app = router(state.clone());

        let uri = "/preamp/local/18/phantom?on=true";
        let (status, body) = call(&app, Method::POST, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent"], false);
        assert!(state.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_write_without_console_host() {
        let app = router(test_state(MemoryTransport::new(), None));
        let (status, body) = call(&app, Method::POST, "/preamp/local/1/pad?on=true", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "console address not set");
    }

    #[tokio::test]
    async fn test_transport_failure_is_bad_gateway() {
        let state = test_state(MemoryTransport::failing_at(0), Some("10.0.0.1"));
        let app = router(state.clone());
        call(&app, Method::POST, "/api/state", Some(two_channels())).await;

        let (status, body) = call(&app, Method::POST, "/preamp/local/3/phantom?on=0", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("10.0.0.1:51326"));
        assert!(state.store.get()[0].phantom);
    }

    #[tokio::test]
    async fn test_sync_runs_to_completion() {
        let state = test_state(MemoryTransport::new(), Some("10.0.0.1"));
        let app = router(state.clone());
        call(&app, Method::POST, "/api/state", Some(two_channels())).await;

        let (status, body) = call(&app, Method::POST, "/api/sync", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["started"], true);
        assert_eq!(body["total"], 3);

        for _ in 0..200 {
            if state.sync.status().status == SyncState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let (_, body) = call(&app, Method::GET, "/api/sync/status", None).await;
        assert_eq!(body["status"], "idle");
        assert_eq!(body["current"], 3);
        assert_eq!(body["last_result"], json!({"synced": 3, "commands": 9}));
        assert_eq!(state.transport.sent().len(), 9);
    }

    #[tokio::test]
    async fn test_sync_conflict_and_missing_host() {
        let app = router(test_state(MemoryTransport::new(), None));
        let (status, _) = call(&app, Method::POST, "/api/sync", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let state = test_state(MemoryTransport::new(), Some("10.0.0.1"));
        let app = router(state.clone());
        let _run = state.sync.begin(ConsoleAddress::new("10.0.0.1", 51326), &[]).unwrap();

        let (status, body) = call(&app, Method::POST, "/api/sync", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "sync already in progress");
    }

    #[tokio::test]
    async fn test_show_lifecycle() {
        let state = test_state(MemoryTransport::new(), None);
        let app = router(state.clone());

        let mut show = two_channels();
        show["name"] = json!("Sunday Service");
        let (status, body) = call(&app, Method::POST, "/api/shows", Some(show)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Sunday_Service");
        assert_eq!(state.store.current_show(), "Sunday_Service");

        let (_, body) = call(&app, Method::GET, "/api/shows", None).await;
        assert_eq!(body["shows"], json!(["Sunday_Service"]));

        let (status, body) = call(&app, Method::GET, "/api/shows/Sunday_Service", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"].as_array().unwrap().len(), 2);

        let (status, _) = call(&app, Method::DELETE, "/api/shows/Sunday_Service", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.store.current_show(), "");

        let (status, body) = call(&app, Method::GET, "/api/shows/Sunday_Service", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
        let (status, _) = call(&app, Method::DELETE, "/api/shows/Sunday_Service", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_save_show_without_making_current() {
        let state = test_state(MemoryTransport::new(), None);
        let app = router(state.clone());

        let show = json!({"name": "rehearsal", "channels": [], "set_current": false});
        let (status, _) = call(&app, Method::POST, "/api/shows", Some(show)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.store.current_show(), "");
    }

    #[tokio::test]
    async fn test_reset() {
        let state = test_state(MemoryTransport::new(), None);
        let app = router(state.clone());
        let mut body = two_channels();
        body["current_show"] = json!("gig");
        call(&app, Method::POST, "/api/state", Some(body)).await;
        state.db.lock().save_snapshot(&state.store.snapshot()).unwrap();
        assert_eq!(state.db.lock().load_channels().unwrap().len(), 2);

        let (status, body) = call(&app, Method::POST, "/api/state/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"], json!([]));
        assert_eq!(body["current_show"], "");

        let stored = state.db.lock().load_snapshot().unwrap();
        assert!(stored.channels.is_empty());
        assert_eq!(stored.current_show, "");
    }
}
