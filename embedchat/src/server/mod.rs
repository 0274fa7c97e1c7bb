//! Embedchat HTTP server.
//!
//! One process serves both the chat API and the widget assets that
//! embedding pages load:
//! - GET  /api/health - liveness probe
//! - GET  /api/widget/config/{config_id} - widget configuration
//! - POST /api/chat - rate-limited chat endpoint
//! - GET  /api/chat/history/{session_id} - session transcript
//! - GET  /embed.js - generated loader script for host pages
//! - GET  /widget/chat-widget.css, /widget/chat-widget.js - widget assets
//! - GET  /demo - demo page embedding the widget
//!
//! Limiter and session state are owned by [`ServerState`] and passed
//! into handlers through axum state, never ambient globals.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ChatError;
use crate::gemini::{build_prompt, pick_fallback, GeminiClient, GenerateError, ResponseSource};
use crate::limiter::{Decision, RateLimiter};
use crate::models::{MessageRole, WidgetConfig};
use crate::store::{SessionStore, SESSION_MAX_IDLE};

/// Shared server state.
pub struct ServerState {
    /// Resolved configuration.
    pub config: ServerConfig,
    /// Per-IP admission control.
    pub limiter: RateLimiter,
    /// In-memory session map.
    pub sessions: SessionStore,
    /// AI backend; `None` means fallback-only mode.
    pub source: Option<Arc<dyn ResponseSource>>,
}

impl ServerState {
    /// Build state from configuration, wiring up the Gemini client when
    /// an API key is present.
    pub fn from_config(config: ServerConfig) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit_window_ms,
            config.rate_limit_max_requests,
        );
        let source = config
            .api_key
            .clone()
            .map(|key| Arc::new(GeminiClient::new(key)) as Arc<dyn ResponseSource>);

        Self {
            config,
            limiter,
            sessions: SessionStore::new(),
            source,
        }
    }
}

// === Request/Response Types ===

/// Body of POST /api/chat. A `context` field is accepted from older
/// widget builds but ignored, which serde does by default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Message text from the visitor.
    #[serde(default)]
    pub message: String,
    /// Client-chosen session identifier.
    #[serde(default)]
    pub session_id: String,
}

/// Query parameters for GET /embed.js.
#[derive(Debug, Deserialize)]
pub struct EmbedParams {
    pub config: Option<String>,
}

// === Server Lifecycle ===

/// Start the server and run until shutdown.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let port = config.port;
    let has_key = config.api_key.is_some();
    let state = Arc::new(ServerState::from_config(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("embedchat server running on http://{addr}");
    info!("widget embed URL: http://localhost:{port}/embed.js");
    info!("health check: http://localhost:{port}/api/health");
    if !has_key {
        warn!("GEMINI_API_KEY not configured, chat will use fallback responses");
    }

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

/// Build the router. Separated from `start_server` so tests can mount
/// it on an ephemeral listener with injected state.
pub fn router(state: Arc<ServerState>) -> Router {
    let production = state.config.is_production();

    Router::new()
        .route("/api/health", get(health))
        .route("/api/widget/config", get(widget_config_default))
        .route("/api/widget/config/{config_id}", get(widget_config))
        .route("/api/chat", post(chat))
        .route("/api/chat/history/{session_id}", get(chat_history))
        .route("/embed.js", get(embed_script))
        .route("/widget/chat-widget.css", get(widget_css))
        .route("/widget/chat-widget.js", get(widget_js))
        .route("/demo", get(demo_page))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(
            move |err: Box<dyn std::any::Any + Send + 'static>| -> Response {
                let detail = err
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| err.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Something went wrong".to_string());
                tracing::error!(%detail, "handler panicked");
                // Detail is only surfaced outside production.
                let message = if production {
                    "Something went wrong".to_string()
                } else {
                    detail
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error", "message": message })),
                )
                    .into_response()
            },
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Handlers ===

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// The config id is accepted for compatibility but not used for lookup;
/// every id gets the defaults.
async fn widget_config(Path(config_id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "config": WidgetConfig::default(),
        "configId": config_id,
    }))
}

async fn widget_config_default() -> Json<serde_json::Value> {
    widget_config(Path("default".to_string())).await
}

async fn chat(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, ChatError> {
    let client_id = addr.ip().to_string();
    if let Decision::Rejected { retry_after_secs } = state.limiter.admit(&client_id).await {
        return Err(ChatError::RateLimited { retry_after_secs });
    }

    let message = req.message.trim();
    if message.is_empty() {
        return Err(ChatError::InvalidRequest);
    }

    let mut session = state.sessions.get_or_create(&req.session_id).await;

    // No AI backend: answer from the canned set.
    let Some(source) = state.source.clone() else {
        let reply = pick_fallback();
        session.append(MessageRole::User, message);
        session.append(MessageRole::Assistant, reply.clone());
        state.sessions.save(session).await;

        return Ok(Json(json!({
            "success": true,
            "response": reply,
            "sessionId": req.session_id,
            "isAI": false,
            "source": "fallback",
        })));
    };

    session.append(MessageRole::User, message);
    let prompt = build_prompt(&session.messages, message);
    // Persist before the upstream call so the transcript keeps the user
    // message even when no assistant reply follows.
    state.sessions.save(session.clone()).await;

    match source.generate(&prompt).await {
        Ok(reply) => {
            session.append(MessageRole::Assistant, reply.clone());
            state.sessions.save(session).await;

            let swept = state.sessions.sweep_expired(SESSION_MAX_IDLE).await;
            if swept > 0 {
                debug!(swept, "expired idle sessions");
            }

            Ok(Json(json!({
                "success": true,
                "response": reply,
                "sessionId": req.session_id,
                "timestamp": Utc::now().to_rfc3339(),
            })))
        }
        Err(GenerateError::Auth) => Err(ChatError::AuthFailure),
        Err(GenerateError::Overloaded) => Err(ChatError::Overloaded),
        Err(GenerateError::Other(detail)) => {
            warn!(%detail, session = %req.session_id, "chat generation failed");
            Err(ChatError::Unknown {
                fallback: pick_fallback(),
            })
        }
    }
}

async fn chat_history(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    match state.sessions.get(&session_id).await {
        Some(session) => Json(json!({
            "success": true,
            "messages": session.messages,
            "sessionId": session_id,
            "createdAt": session.created_at,
            "lastActivity": session.last_activity,
        })),
        None => Json(json!({
            "success": true,
            "messages": [],
            "sessionId": session_id,
        })),
    }
}

async fn embed_script(
    headers: HeaderMap,
    Query(params): Query<EmbedParams>,
) -> impl IntoResponse {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost:3000");
    let server_url = format!("http://{host}");
    let config_id = params.config.unwrap_or_else(|| "default".to_string());

    (
        [(header::CONTENT_TYPE, "application/javascript")],
        render_embed_script(&config_id, &server_url),
    )
}

/// Render the loader script host pages include via a `<script>` tag.
/// It fetches the widget config from this server, injects the CSS and
/// widget script, and instantiates the widget against `/api`. String
/// values are embedded as JSON so arbitrary config ids can't break out
/// of the script.
fn render_embed_script(config_id: &str, server_url: &str) -> String {
    let config_id_js = serde_json::to_string(config_id).unwrap_or_else(|_| "\"default\"".into());
    let server_url_js =
        serde_json::to_string(server_url).unwrap_or_else(|_| "\"http://localhost:3000\"".into());

    format!(
        r#"(function() {{
  'use strict';

  const CONFIG_ID = {config_id_js};
  const SERVER_URL = {server_url_js};

  fetch(SERVER_URL + '/api/widget/config/' + encodeURIComponent(CONFIG_ID))
    .then((response) => response.json())
    .then((data) => {{
      if (data.success) {{
        loadChatWidget(data.config);
      }} else {{
        console.error('Failed to load chat widget configuration');
      }}
    }})
    .catch((error) => {{
      console.error('Chat widget error:', error);
      loadChatWidget({{
        title: 'Chat with us!',
        welcomeMessage: 'Hi! How can I help you today?',
        theme: {{ primaryColor: '#667eea', secondaryColor: '#764ba2' }}
      }});
    }});

  function loadChatWidget(config) {{
    const css = document.createElement('link');
    css.rel = 'stylesheet';
    css.href = SERVER_URL + '/widget/chat-widget.css';
    document.head.appendChild(css);

    const script = document.createElement('script');
    script.src = SERVER_URL + '/widget/chat-widget.js';
    script.onload = function() {{
      if (window.ChatWidget) {{
        window.chatWidget = new window.ChatWidget(
          Object.assign({{}}, config, {{ apiUrl: SERVER_URL + '/api' }})
        );
      }}
    }};
    document.head.appendChild(script);
  }}
}})();
"#
    )
}

async fn widget_css() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("chat-widget.css"),
    )
}

async fn widget_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        include_str!("chat-widget.js"),
    )
}

async fn demo_page() -> Html<&'static str> {
    Html(include_str!("demo.html"))
}

async fn not_found(uri: Uri) -> ChatError {
    ChatError::NotFound {
        path: uri.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::FALLBACK_RESPONSES;
    use crate::models::ChatSession;
    use async_trait::async_trait;

    /// Backend stub returning a fixed reply.
    struct StubSource(&'static str);

    #[async_trait]
    impl ResponseSource for StubSource {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Ok(self.0.to_string())
        }
    }

    /// Backend stub failing with a fixed error kind.
    struct FailingSource(GenerateError);

    #[async_trait]
    impl ResponseSource for FailingSource {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Err(self.0.clone())
        }
    }

    fn fallback_only_state() -> Arc<ServerState> {
        Arc::new(ServerState::from_config(ServerConfig::default()))
    }

    fn state_with_source(source: impl ResponseSource + 'static) -> Arc<ServerState> {
        let mut state = ServerState::from_config(ServerConfig::default());
        state.source = Some(Arc::new(source));
        Arc::new(state)
    }

    /// Serve the router on an ephemeral port and return the base URL.
    async fn spawn_server(state: Arc<ServerState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router(state).into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        format!("http://{addr}")
    }

    async fn post_chat(
        base: &str,
        message: &str,
        session_id: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({ "message": message, "sessionId": session_id }))
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn health_reports_status_and_version() {
        let base = spawn_server(fallback_only_state()).await;

        let body: serde_json::Value = reqwest::get(format!("{base}/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn widget_config_serves_defaults_for_any_id() {
        let base = spawn_server(fallback_only_state()).await;

        for (url, expected_id) in [
            (format!("{base}/api/widget/config"), "default"),
            (format!("{base}/api/widget/config/acme-co"), "acme-co"),
        ] {
            let body: serde_json::Value =
                reqwest::get(url).await.unwrap().json().await.unwrap();
            assert_eq!(body["success"], true);
            assert_eq!(body["configId"], expected_id);
            assert_eq!(body["config"]["title"], "Chat with us!");
            assert_eq!(body["config"]["theme"]["primaryColor"], "#667eea");
        }
    }

    #[tokio::test]
    async fn chat_without_ai_answers_from_fallback_set() {
        let state = fallback_only_state();
        let base = spawn_server(state.clone()).await;

        let (status, body) = post_chat(&base, "hello", "s1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["isAI"], false);
        assert_eq!(body["source"], "fallback");
        let reply = body["response"].as_str().unwrap();
        assert!(FALLBACK_RESPONSES.contains(&reply));

        let history: serde_json::Value =
            reqwest::get(format!("{base}/api/chat/history/s1"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "hello");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], reply);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_creating_a_session() {
        let state = fallback_only_state();
        let base = spawn_server(state.clone()).await;

        let (status, body) = post_chat(&base, "   ", "s-blank").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required");
        assert!(state.sessions.is_empty().await);
    }

    #[tokio::test]
    async fn successful_generation_appends_reply_and_sweeps() {
        let state = state_with_source(StubSource("Our hours are 9-5."));
        let mut stale = ChatSession::new("stale");
        stale.last_activity = Utc::now() - chrono::Duration::hours(2);
        state.sessions.insert_raw(stale).await;
        let base = spawn_server(state.clone()).await;

        let (status, body) = post_chat(&base, "what are your hours?", "s2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["response"], "Our hours are 9-5.");
        assert!(body["timestamp"].is_string());

        let session = state.sessions.get("s2").await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].role, MessageRole::Assistant);

        // The post-response sweep removed the stale session.
        assert!(state.sessions.get("stale").await.is_none());
    }

    #[tokio::test]
    async fn quota_failure_maps_to_429_and_keeps_user_message() {
        let state = state_with_source(FailingSource(GenerateError::Overloaded));
        let base = spawn_server(state.clone()).await;

        let (status, body) = post_chat(&base, "hello?", "s3").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body["error"],
            "AI service is temporarily busy. Please try again in a moment."
        );

        // User message persisted, no assistant reply appended.
        let session = state.sessions.get("s3").await.unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn auth_failure_maps_to_500() {
        let base = spawn_server(state_with_source(FailingSource(GenerateError::Auth))).await;

        let (status, body) = post_chat(&base, "hi", "s4").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "AI service authentication failed. Please contact support."
        );
    }

    #[tokio::test]
    async fn unknown_failure_carries_a_fallback_phrase() {
        let base = spawn_server(state_with_source(FailingSource(GenerateError::Other(
            "backend exploded".to_string(),
        ))))
        .await;

        let (status, body) = post_chat(&base, "hi", "s5").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "Sorry, I encountered an issue. Please try again."
        );
        let fallback = body["fallback"].as_str().unwrap();
        assert!(FALLBACK_RESPONSES.contains(&fallback));
        // Upstream detail never reaches the caller.
        assert!(!body.to_string().contains("backend exploded"));
    }

    #[tokio::test]
    async fn unknown_session_history_is_an_empty_list() {
        let base = spawn_server(fallback_only_state()).await;

        let body: serde_json::Value =
            reqwest::get(format!("{base}/api/chat/history/unknown-session"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);
        assert_eq!(body["sessionId"], "unknown-session");
    }

    #[tokio::test]
    async fn rate_limit_rejects_over_quota_clients() {
        let config = ServerConfig {
            rate_limit_max_requests: 2,
            ..ServerConfig::default()
        };
        let base = spawn_server(Arc::new(ServerState::from_config(config))).await;

        let (first, _) = post_chat(&base, "one", "s6").await;
        let (second, _) = post_chat(&base, "two", "s6").await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);

        let (third, body) = post_chat(&base, "three", "s6").await;
        assert_eq!(third, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Too many requests. Please try again later.");
        let retry_after = body["retryAfter"].as_u64().unwrap();
        assert!(retry_after <= 900);
    }

    #[tokio::test]
    async fn unmatched_routes_get_json_404() {
        let base = spawn_server(fallback_only_state()).await;

        let response = reqwest::get(format!("{base}/api/nope")).await.unwrap();
        assert_eq!(response.status().as_u16(), 404);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Endpoint not found");
        assert_eq!(body["path"], "/api/nope");
    }

    #[tokio::test]
    async fn embed_script_interpolates_host_and_config() {
        let base = spawn_server(fallback_only_state()).await;

        let response = reqwest::get(format!("{base}/embed.js?config=acme-co"))
            .await
            .unwrap();
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "application/javascript"
        );
        let script = response.text().await.unwrap();
        assert!(script.contains("const CONFIG_ID = \"acme-co\";"));
        let host = base.trim_start_matches("http://");
        assert!(script.contains(&format!("const SERVER_URL = \"http://{host}\";")));
        assert!(script.contains("/widget/chat-widget.js"));
    }

    #[test]
    fn embed_script_escapes_hostile_config_ids() {
        let script = render_embed_script("\"; alert(1); //", "http://localhost:3000");
        assert!(!script.contains("const CONFIG_ID = \"\";"));
        assert!(script.contains(r#"const CONFIG_ID = "\"; alert(1); //";"#));
    }

    #[tokio::test]
    async fn widget_assets_and_demo_are_served() {
        let base = spawn_server(fallback_only_state()).await;

        let css = reqwest::get(format!("{base}/widget/chat-widget.css"))
            .await
            .unwrap();
        assert_eq!(
            css.headers()["content-type"].to_str().unwrap(),
            "text/css; charset=utf-8"
        );

        let js = reqwest::get(format!("{base}/widget/chat-widget.js"))
            .await
            .unwrap();
        assert!(js.text().await.unwrap().contains("window.ChatWidget"));

        let demo = reqwest::get(format!("{base}/demo")).await.unwrap();
        assert_eq!(demo.status().as_u16(), 200);
        assert!(demo.text().await.unwrap().contains("embed.js"));
    }
}
