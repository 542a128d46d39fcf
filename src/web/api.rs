use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::ws::{self, WsEvent, WsMessage, broadcast_message};
use crate::auth::{Identity, SessionProvider, bearer_token};
use crate::dashboard;
use crate::editor::{DraftRegistry, EditingSession, autosave_options};
use crate::errors::{ConfigError, DraftError, StoreError};
use crate::export::{self, ExportOptions};
use crate::settings::{self, UserSettings};
use crate::shortcuts::{KeyEvent, SHORTCUTS, ShortcutDispatcher};
use crate::store::{DbHandle, EntryPatch, EntryStore, ListQuery, NewEntry, summarize};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub entries: Arc<dyn EntryStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub drafts: DraftRegistry,
    pub ws_tx: broadcast::Sender<WsEvent>,
    /// Seed for users who never saved settings.
    pub settings_defaults: UserSettings,
    pub export_defaults: ExportOptions,
}

impl AppState {
    pub fn new(
        db: DbHandle,
        sessions: Arc<dyn SessionProvider>,
        settings_defaults: UserSettings,
        export_defaults: ExportOptions,
    ) -> Self {
        let (ws_tx, _) = broadcast::channel(256);
        Self {
            entries: Arc::new(db.clone()),
            db,
            sessions,
            drafts: DraftRegistry::new(),
            ws_tx,
            settings_defaults,
            export_defaults,
        }
    }

    async fn user_settings(&self, owner_id: &str) -> Result<UserSettings, ApiError> {
        settings::load(&self.db, owner_id, &self.settings_defaults)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub include_private: Option<bool>,
    pub include_metadata: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenDraftRequest {
    #[serde(default)]
    pub entry_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DraftChangeRequest {
    pub content: String,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EntryNotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::ContentRequired => ApiError::BadRequest(err.to_string()),
            StoreError::Database(_) | StoreError::Other(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DraftError> for ApiError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::DraftNotFound { .. } => ApiError::NotFound(err.to_string()),
            DraftError::Save(_) => ApiError::Internal(err.to_string()),
            DraftError::Store(store) => store.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

// ── Authentication ────────────────────────────────────────────────────

/// Resolve the caller from `Authorization: Bearer`, or from `query_token`
/// when no header is present.
pub fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Identity, ApiError> {
    let token = match headers.get(header::AUTHORIZATION) {
        Some(value) => value.to_str().ok().and_then(bearer_token),
        None => query_token,
    };
    let token = token.ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;
    state
        .sessions
        .current(token)
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
}

/// Extractor for the authenticated caller.
pub struct AuthUser(pub Identity);

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers, None).map(AuthUser)
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/me", get(me))
        .route("/api/entries", get(list_entries).post(create_entry))
        .route(
            "/api/entries/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
        .route("/api/entries/{id}/export", get(export_entry))
        .route("/api/export", get(export_all))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/shortcuts", get(list_shortcuts))
        .route("/api/shortcuts/dispatch", post(dispatch_shortcut))
        .route("/api/drafts", post(open_draft))
        .route(
            "/api/drafts/{id}",
            get(get_draft).put(update_draft).delete(close_draft),
        )
        .route("/api/drafts/{id}/save", post(save_draft))
        .route("/api/drafts/{id}/reset-status", post(reset_draft_status))
        .route("/ws", get(ws::ws_handler))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(user)
}

async fn list_entries(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.entries.list(&user.user_id, query).await?;
    Ok(Json(page))
}

async fn create_entry(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<NewEntry>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.entries.create(&user.user_id, req).await?;
    info!(entry_id = %entry.id, user_id = %user.user_id, "Entry created");
    broadcast_message(
        &state.ws_tx,
        &user.user_id,
        &WsMessage::EntryCreated {
            entry: summarize(&entry),
        },
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_entry(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.entries.get(&user.user_id, &id).await?;
    Ok(Json(entry))
}

async fn update_entry(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(patch): Json<EntryPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.entries.update(&user.user_id, &id, patch).await?;
    broadcast_message(
        &state.ws_tx,
        &user.user_id,
        &WsMessage::EntryUpdated {
            entry: summarize(&entry),
        },
    );
    Ok(Json(entry))
}

async fn delete_entry(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.entries.archive(&user.user_id, &id).await?;
    info!(entry_id = %id, user_id = %user.user_id, "Entry archived");
    broadcast_message(
        &state.ws_tx,
        &user.user_id,
        &WsMessage::EntryArchived {
            entry_id: id.clone(),
        },
    );
    Ok(Json(serde_json::json!({"message": "Entry archived successfully"})))
}

async fn export_options(
    state: &AppState,
    owner_id: &str,
    query: &ExportQuery,
) -> Result<ExportOptions, ApiError> {
    let settings = state.user_settings(owner_id).await?;
    Ok(ExportOptions {
        include_metadata: query
            .include_metadata
            .unwrap_or(settings.export_include_metadata),
        include_private: query
            .include_private
            .unwrap_or(state.export_defaults.include_private),
    })
}

fn markdown_response(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_entry(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let entry = state.entries.get(&user.user_id, &id).await?;
    let opts = export_options(&state, &user.user_id, &query).await?;
    Ok(markdown_response(
        &export::entry_filename(&entry),
        export::entry_markdown(&entry, &opts),
    ))
}

async fn export_all(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let entries = state.entries.all(&user.user_id, false).await?;
    let opts = export_options(&state, &user.user_id, &query).await?;
    let files = export::export_all(&entries, &opts);
    let now = chrono::Utc::now();
    let filename = format!("journal-export-{}.md", now.format("%Y-%m-%d"));
    Ok(markdown_response(&filename, export::bundle(&files, now)))
}

async fn get_dashboard(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.entries.all(&user.user_id, false).await?;
    let today = chrono::Utc::now().date_naive();
    Ok(Json(dashboard::compute(&entries, today)))
}

async fn get_settings(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.user_settings(&user.user_id).await?))
}

async fn update_settings(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(patch): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let current = state.user_settings(&user.user_id).await?;
    let updated = current.merged(patch)?;
    settings::save(&state.db, &user.user_id, &updated)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let options = autosave_options(&updated);
    for draft in state.drafts.for_owner(&user.user_id) {
        draft.reconfigure(options);
    }
    Ok(Json(updated))
}

async fn list_shortcuts(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.user_settings(&user.user_id).await?;
    Ok(Json(serde_json::json!({
        "enabled": settings.keyboard_shortcuts_enabled,
        "shortcuts": SHORTCUTS,
    })))
}

async fn dispatch_shortcut(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(event): Json<KeyEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.user_settings(&user.user_id).await?;
    let dispatcher = ShortcutDispatcher::new(settings.keyboard_shortcuts_enabled);
    Ok(Json(dispatcher.dispatch(&event)))
}

async fn open_draft(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    body: Option<Json<OpenDraftRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let existing = match req.entry_id {
        Some(id) => {
            let entry = state.entries.get(&user.user_id, &id).await?;
            // Archived entries are hidden from listings; edits would vanish.
            if entry.is_archived {
                return Err(StoreError::EntryNotFound { id }.into());
            }
            Some((entry.id, entry.content))
        }
        None => None,
    };
    let settings = state.user_settings(&user.user_id).await?;
    let session = state.drafts.insert(EditingSession::open(
        state.entries.clone(),
        &user.user_id,
        existing,
        autosave_options(&settings),
        state.ws_tx.clone(),
    ));
    info!(draft_id = %session.id, user_id = %user.user_id, "Draft opened");
    Ok((StatusCode::CREATED, Json(session.view())))
}

async fn get_draft(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.drafts.get(&user.user_id, &id)?;
    Ok(Json(session.view()))
}

async fn update_draft(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<DraftChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.drafts.get(&user.user_id, &id)?;
    session.apply_change(req.content);
    Ok(Json(session.view()))
}

async fn save_draft(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.drafts.get(&user.user_id, &id)?;
    session.force_save().await?;
    Ok(Json(session.view()))
}

async fn reset_draft_status(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.drafts.get(&user.user_id, &id)?;
    session.reset_status();
    Ok(Json(session.view()))
}

async fn close_draft(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.drafts.remove(&user.user_id, &id)?;
    if let Err(e) = session.close().await {
        warn!(draft_id = %id, "Final save failed on close: {}", e);
        return Err(e.into());
    }
    Ok(Json(serde_json::json!({
        "message": "Draft closed",
        "entry_id": session.entry_id(),
    })))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenSessions;
    use crate::config::UserAccount;
    use crate::store::JournalDb;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const ALICE: &str = "Bearer alice-token";
    const BOB: &str = "Bearer bob-token";

    fn test_state() -> SharedState {
        let db = DbHandle::new(JournalDb::new_in_memory().unwrap());
        let sessions = StaticTokenSessions::new(&[
            UserAccount {
                token: "alice-token".into(),
                user_id: "alice".into(),
                email: Some("alice@example.com".into()),
                name: Some("Alice".into()),
            },
            UserAccount {
                token: "bob-token".into(),
                user_id: "bob".into(),
                email: None,
                name: None,
            },
        ]);
        Arc::new(AppState::new(
            db,
            Arc::new(sessions),
            UserSettings::default(),
            ExportOptions::default(),
        ))
    }

    fn test_app() -> Router {
        api_router().with_state(test_state())
    }

    fn request(
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn create(app: &Router, auth: &str, content: &str) -> serde_json::Value {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/entries",
                Some(auth),
                Some(serde_json::json!({"content": content})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response.into_body()).await
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = app.oneshot(request("GET", "/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response.into_body()).await, "ok");
    }

    #[tokio::test]
    async fn test_missing_or_unknown_token_is_unauthorized() {
        let app = test_app();
        for auth in [None, Some("Bearer wrong"), Some("Basic alice-token")] {
            let response = app
                .clone()
                .oneshot(request("GET", "/api/entries", auth, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body: serde_json::Value = body_json(response.into_body()).await;
            assert_eq!(body["error"], "Unauthorized");
        }
    }

    #[tokio::test]
    async fn test_me_returns_identity() {
        let app = test_app();
        let response = app.oneshot(request("GET", "/api/me", Some(ALICE), None)).await.unwrap();
        let me: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(me["user_id"], "alice");
        assert_eq!(me["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn test_create_and_list_entries() {
        let app = test_app();
        let entry = create(&app, ALICE, "<h1>Sunday</h1><p>Slow morning.</p>").await;
        assert_eq!(entry["title"], "Sunday");
        assert_eq!(entry["word_count"], 3);
        assert_eq!(entry["is_private"], true);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/entries", Some(ALICE), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(page["entries"].as_array().unwrap().len(), 1);
        assert_eq!(page["has_more"], false);
        assert_eq!(page["entries"][0]["preview"], "Sunday Slow morning.");
    }

    #[tokio::test]
    async fn test_create_requires_content() {
        let app = test_app();
        let response = app
            .oneshot(request(
                "POST",
                "/api/entries",
                Some(ALICE),
                Some(serde_json::json!({"content": "<p></p>"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "Content is required");
    }

    #[tokio::test]
    async fn test_list_search_and_pagination() {
        let app = test_app();
        create(&app, ALICE, "<p>apples</p>").await;
        create(&app, ALICE, "<p>bananas</p>").await;
        create(&app, ALICE, "<p>apple pie</p>").await;

        let response = app
            .clone()
            .oneshot(request("GET", "/api/entries?q=apple", Some(ALICE), None))
            .await
            .unwrap();
        let page: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(page["entries"].as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/entries?limit=2", Some(ALICE), None))
            .await
            .unwrap();
        let page: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(page["entries"].as_array().unwrap().len(), 2);
        assert_eq!(page["has_more"], true);
        let cursor = page["next_cursor"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request(
                "GET",
                &format!("/api/entries?limit=2&cursor={}", cursor),
                Some(ALICE),
                None,
            ))
            .await
            .unwrap();
        let page: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(page["entries"].as_array().unwrap().len(), 1);
        assert_eq!(page["has_more"], false);
    }

    #[tokio::test]
    async fn test_entries_are_isolated_between_users() {
        let app = test_app();
        let entry = create(&app, ALICE, "<p>private thoughts</p>").await;
        let uri = format!("/api/entries/{}", entry["id"].as_str().unwrap());

        for method in ["GET", "DELETE"] {
            let response = app
                .clone()
                .oneshot(request(method, &uri, Some(BOB), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
        }
        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &uri,
                Some(BOB),
                Some(serde_json::json!({"content": "<p>mine now</p>"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("GET", "/api/entries", Some(BOB), None))
            .await
            .unwrap();
        let page: serde_json::Value = body_json(response.into_body()).await;
        assert!(page["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_archive_entry() {
        let app = test_app();
        let entry = create(&app, ALICE, "<p>draft</p>").await;
        let uri = format!("/api/entries/{}", entry["id"].as_str().unwrap());

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &uri,
                Some(ALICE),
                Some(serde_json::json!({"mood": "calm", "is_favorite": true})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(updated["mood"], "calm");
        assert_eq!(updated["is_favorite"], true);
        assert_eq!(updated["content"], "<p>draft</p>");

        let response = app
            .clone()
            .oneshot(request("DELETE", &uri, Some(ALICE), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("GET", &uri, Some(ALICE), None))
            .await
            .unwrap();
        let archived: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(archived["is_archived"], true);

        let response = app
            .oneshot(request("GET", "/api/entries", Some(ALICE), None))
            .await
            .unwrap();
        let page: serde_json::Value = body_json(response.into_body()).await;
        assert!(page["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_entry_broadcasts_ws() {
        let state = test_state();
        let mut rx = state.ws_tx.subscribe();
        let app = api_router().with_state(state);
        create(&app, ALICE, "<p>hello</p>").await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.owner_id, "alice");
        assert!(event.payload.contains("EntryCreated"));
    }

    #[tokio::test]
    async fn test_export_entry_markdown() {
        let app = test_app();
        let entry = create(&app, ALICE, "<h2>Plan</h2><p>Write <strong>more</strong>.</p>").await;
        let uri = format!(
            "/api/entries/{}/export?include_metadata=false",
            entry["id"].as_str().unwrap()
        );
        let response = app.oneshot(request("GET", &uri, Some(ALICE), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/markdown")
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("-Plan.md"));
        assert_eq!(
            body_text(response.into_body()).await,
            "# Plan\n\n## Plan\n\nWrite **more**."
        );
    }

    #[tokio::test]
    async fn test_export_all_skips_private_by_default() {
        let app = test_app();
        create(&app, ALICE, "<p>secret</p>").await;
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/entries",
                Some(ALICE),
                Some(serde_json::json!({"content": "<p>shared</p>", "is_private": false})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/export", Some(ALICE), None))
            .await
            .unwrap();
        let archive = body_text(response.into_body()).await;
        assert!(archive.starts_with("# Journal Entries Archive"));
        assert!(archive.contains("-shared.md"));
        assert!(!archive.contains("-secret.md"));

        let response = app
            .oneshot(request("GET", "/api/export?include_private=true", Some(ALICE), None))
            .await
            .unwrap();
        let archive = body_text(response.into_body()).await;
        assert!(archive.contains("-secret.md"));
    }

    #[tokio::test]
    async fn test_dashboard_counts_entries() {
        let app = test_app();
        create(&app, ALICE, "<p>one two</p>").await;
        create(&app, ALICE, "<p>three</p>").await;

        let response = app
            .oneshot(request("GET", "/api/dashboard", Some(ALICE), None))
            .await
            .unwrap();
        let stats: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(stats["total_entries"], 2);
        assert_eq!(stats["total_words"], 3);
        assert_eq!(stats["current_streak"], 1);
        assert_eq!(stats["this_week_entries"], 2);
    }

    #[tokio::test]
    async fn test_settings_merge_and_validate() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(request("GET", "/api/settings", Some(ALICE), None))
            .await
            .unwrap();
        let settings: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(settings["autosave_interval_secs"], 10);

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/api/settings",
                Some(ALICE),
                Some(serde_json::json!({"theme": "dark"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/api/settings",
                Some(ALICE),
                Some(serde_json::json!({"autosave_interval_secs": 30})),
            ))
            .await
            .unwrap();
        let settings: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(settings["theme"], "dark");
        assert_eq!(settings["autosave_interval_secs"], 30);

        let response = app
            .oneshot(request(
                "PUT",
                "/api/settings",
                Some(ALICE),
                Some(serde_json::json!({"autosave_interval_secs": 12})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_shortcut_dispatch_respects_setting() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/shortcuts/dispatch",
                Some(ALICE),
                Some(serde_json::json!({"key": "s", "meta": true})),
            ))
            .await
            .unwrap();
        let dispatch: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(dispatch["action"], "save");
        assert_eq!(dispatch["prevent_default"], true);

        app.clone()
            .oneshot(request(
                "PUT",
                "/api/settings",
                Some(ALICE),
                Some(serde_json::json!({"keyboard_shortcuts_enabled": false})),
            ))
            .await
            .unwrap();
        let response = app
            .oneshot(request(
                "POST",
                "/api/shortcuts/dispatch",
                Some(ALICE),
                Some(serde_json::json!({"key": "s", "meta": true})),
            ))
            .await
            .unwrap();
        let dispatch: serde_json::Value = body_json(response.into_body()).await;
        assert!(dispatch.is_null());
    }

    #[tokio::test]
    async fn test_draft_lifecycle() {
        let state = test_state();
        let app = api_router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(request("POST", "/api/drafts", Some(ALICE), Some(serde_json::json!({}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let draft: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(draft["status"], "idle");
        assert_eq!(draft["delay_secs"], 10);
        let uri = format!("/api/drafts/{}", draft["id"].as_str().unwrap());

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &uri,
                Some(ALICE),
                Some(serde_json::json!({"content": "<p>Hello world</p>"})),
            ))
            .await
            .unwrap();
        let view: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(view["dirty"], true);
        assert_eq!(view["save_pending"], true);

        let response = app
            .clone()
            .oneshot(request("POST", &format!("{uri}/save"), Some(ALICE), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(view["status"], "saved");
        assert_eq!(view["status_label"], "Saved");
        assert_eq!(view["dirty"], false);
        let entry_id = view["entry_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request("POST", &format!("{uri}/reset-status"), Some(ALICE), None))
            .await
            .unwrap();
        let view: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(view["status"], "idle");

        // Other users cannot see the draft.
        let response = app
            .clone()
            .oneshot(request("GET", &uri, Some(BOB), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(request("DELETE", &uri, Some(ALICE), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.drafts.is_empty());

        let response = app
            .oneshot(request("GET", &format!("/api/entries/{entry_id}"), Some(ALICE), None))
            .await
            .unwrap();
        let entry: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(entry["content"], "<p>Hello world</p>");
    }

    #[tokio::test]
    async fn test_draft_for_existing_entry_starts_clean() {
        let app = test_app();
        let entry = create(&app, ALICE, "<p>already saved</p>").await;
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/drafts",
                Some(ALICE),
                Some(serde_json::json!({"entry_id": entry["id"]})),
            ))
            .await
            .unwrap();
        let draft: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(draft["entry_id"], entry["id"]);
        assert_eq!(draft["content"], "<p>already saved</p>");
        assert_eq!(draft["dirty"], false);

        let response = app
            .oneshot(request(
                "POST",
                "/api/drafts",
                Some(ALICE),
                Some(serde_json::json!({"entry_id": "missing"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_draft_for_archived_entry_is_not_found() {
        let state = test_state();
        let app = api_router().with_state(state.clone());
        let entry = create(&app, ALICE, "<p>put away</p>").await;
        let uri = format!("/api/entries/{}", entry["id"].as_str().unwrap());
        let response = app
            .clone()
            .oneshot(request("DELETE", &uri, Some(ALICE), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(
                "POST",
                "/api/drafts",
                Some(ALICE),
                Some(serde_json::json!({"entry_id": entry["id"]})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.drafts.is_empty());
    }

    #[tokio::test]
    async fn test_draft_save_rejection_is_internal_error() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(request("POST", "/api/drafts", Some(ALICE), None))
            .await
            .unwrap();
        let draft: serde_json::Value = body_json(response.into_body()).await;
        let uri = format!("/api/drafts/{}", draft["id"].as_str().unwrap());

        app.clone()
            .oneshot(request(
                "PUT",
                &uri,
                Some(ALICE),
                Some(serde_json::json!({"content": "<p>   </p>"})),
            ))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(request("POST", &format!("{uri}/save"), Some(ALICE), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("Content is required"));

        let response = app
            .oneshot(request("GET", &uri, Some(ALICE), None))
            .await
            .unwrap();
        let view: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(view["status"], "error");
        assert_eq!(view["status_label"], "Save failed");
    }

    #[tokio::test]
    async fn test_settings_update_reconfigures_open_drafts() {
        let state = test_state();
        let app = api_router().with_state(state.clone());
        let response = app
            .clone()
            .oneshot(request("POST", "/api/drafts", Some(ALICE), None))
            .await
            .unwrap();
        let draft: serde_json::Value = body_json(response.into_body()).await;

        app.oneshot(request(
            "PUT",
            "/api/settings",
            Some(ALICE),
            Some(serde_json::json!({"autosave_interval_secs": 60})),
        ))
        .await
        .unwrap();

        let session = state
            .drafts
            .get("alice", draft["id"].as_str().unwrap())
            .unwrap();
        assert_eq!(session.view().delay_secs, 60);
    }
}
