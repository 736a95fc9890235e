//! Web chat: one page plus a small JSON API.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use runtime::{Backend, ConversationHistory, Session, SessionId};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::Tools;

const INDEX_HTML: &str = include_str!("../assets/index.html");

type SharedSession<B> = Arc<Mutex<Session<B, Tools>>>;

/// How long idle sessions live and how many are kept at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            max_sessions: 1000,
        }
    }
}

struct Entry<B> {
    session: SharedSession<B>,
    last_used: Instant,
}

/// Everything the handlers share. Sessions live only in memory.
pub struct ServerState<B> {
    backend: B,
    tools: Tools,
    max_iterations: usize,
    limits: SessionLimits,
    sessions: Mutex<HashMap<SessionId, Entry<B>>>,
}

impl<B: Backend + Clone> ServerState<B> {
    pub fn new(backend: B, tools: Tools, max_iterations: usize, limits: SessionLimits) -> Self {
        Self {
            backend,
            tools,
            max_iterations,
            limits,
            sessions: Mutex::default(),
        }
    }

    /// A session that is not registered until [`ServerState::insert`].
    fn create(&self) -> Session<B, Tools> {
        Session::new(self.backend.clone(), Arc::clone(&self.tools))
            .with_max_iterations(self.max_iterations)
    }

    /// Register a session whose first turn succeeded.
    ///
    /// Expired sessions are swept first; if the map is still full the
    /// least recently used one is evicted.
    async fn insert(&self, id: SessionId, session: SharedSession<B>) {
        let mut sessions = self.sessions.lock().await;
        let ttl = self.limits.idle_ttl;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_used.elapsed() < ttl);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "swept idle sessions");
        }

        while sessions.len() >= self.limits.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            info!(session = %oldest, "session evicted");
        }

        sessions.insert(
            id,
            Entry {
                session,
                last_used: Instant::now(),
            },
        );
        info!(session = %id, open = sessions.len(), "session opened");
    }

    /// Look up a live session and mark it used. Expired entries are dropped.
    async fn get(&self, id: SessionId) -> Result<SharedSession<B>, ApiError> {
        let mut sessions = self.sessions.lock().await;
        let expired = match sessions.get_mut(&id) {
            Some(entry) if entry.last_used.elapsed() < self.limits.idle_ttl => {
                entry.last_used = Instant::now();
                return Ok(Arc::clone(&entry.session));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            sessions.remove(&id);
            info!(session = %id, "session expired");
        }
        Err(ApiError::not_found(format!("session not found: {id}")))
    }
}

pub fn router<B>(state: Arc<ServerState<B>>) -> Router
where
    B: Backend + Clone + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/chat", post(chat::<B>))
        .route("/api/history/:id", get(history::<B>))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<B>(
    listener: TcpListener,
    state: Arc<ServerState<B>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()>
where
    B: Backend + Clone + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: SessionId,
    pub reply: String,
    pub history: ConversationHistory,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: SessionId,
    pub history: ConversationHistory,
}

async fn chat<B>(
    State(state): State<Arc<ServerState<B>>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError>
where
    B: Backend + Clone + 'static,
{
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    if let Some(raw) = payload.session_id.as_deref() {
        let session_id = parse_id(raw)?;
        let shared = state.get(session_id).await?;
        let mut session = shared.lock().await;
        let reply = session.chat(message).await.map_err(|e| {
            warn!(session = %session_id, error = %e, "chat failed");
            ApiError::from(e)
        })?;
        return Ok(Json(ChatResponse {
            session_id,
            reply,
            history: session.history().clone(),
        }));
    }

    // A new session is only kept once its first turn succeeds.
    let mut session = state.create();
    let session_id = session.id;
    let reply = session.chat(message).await.map_err(|e| {
        warn!(session = %session_id, error = %e, "first turn failed");
        ApiError::from(e)
    })?;
    let history = session.history().clone();
    state
        .insert(session_id, Arc::new(Mutex::new(session)))
        .await;

    Ok(Json(ChatResponse {
        session_id,
        reply,
        history,
    }))
}

async fn history<B>(
    State(state): State<Arc<ServerState<B>>>,
    Path(raw): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError>
where
    B: Backend + Clone + 'static,
{
    let session_id = parse_id(&raw)?;
    let shared = state.get(session_id).await?;
    let history = shared.lock().await.history().clone();
    Ok(Json(HistoryResponse {
        session_id,
        history,
    }))
}

fn parse_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid session id: {raw}")))
}

/// API error response body:
/// `{ "ok": false, "error": { "code": "<code>", "message": "<message>" } }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub ok: bool,
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse {
                ok: false,
                error: ApiErrorBody {
                    code: code.into(),
                    message: message.into(),
                },
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<runtime::Error> for ApiError {
    fn from(err: runtime::Error) -> Self {
        let message = err.to_string();
        match err {
            runtime::Error::Model(_) => Self::new(StatusCode::BAD_GATEWAY, "model", message),
            runtime::Error::MaxIterations(_) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, "max_iterations", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::Policy;
    use runtime::{Message, ModelError, ModelRequest, ModelResponse, SqlQueryTool, ToolRegistry};
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use storage::Store;
    use tokio::sync::oneshot;

    /// Answers every question by echoing it.
    #[derive(Clone)]
    struct Echo;

    impl Backend for Echo {
        async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
            let last = request.messages.last().map(Message::text).unwrap_or_default();
            if last == "falla" {
                return Err(ModelError::Api("503: overloaded".into()));
            }
            Ok(ModelResponse {
                message: Message::assistant(format!("eco: {last}")),
                usage: Default::default(),
            })
        }
    }

    struct TestServer {
        addr: SocketAddr,
        state: Arc<ServerState<Echo>>,
        client: reqwest::Client,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl TestServer {
        async fn start() -> Self {
            Self::with_limits(SessionLimits::default()).await
        }

        async fn with_limits(limits: SessionLimits) -> Self {
            let tools = Arc::new(
                ToolRegistry::standard(SqlQueryTool::new(
                    Store::new("/nonexistent/anhelados.db"),
                    Policy::permissive(),
                ))
                .unwrap(),
            );
            let state = Arc::new(ServerState::new(Echo, tools, 3, limits));
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = oneshot::channel::<()>();
            tokio::spawn(serve(listener, Arc::clone(&state), async move {
                let _ = rx.await;
            }));
            Self {
                addr,
                state,
                client: reqwest::Client::new(),
                shutdown: Some(tx),
            }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{path}", self.addr)
        }

        async fn open_sessions(&self) -> usize {
            self.state.sessions.lock().await.len()
        }

        async fn history_status(&self, id: &Value) -> u16 {
            let id = id.as_str().unwrap();
            self.client
                .get(self.url(&format!("/api/history/{id}")))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }

        async fn post_chat(&self, body: Value) -> (u16, Value) {
            let response = self
                .client
                .post(self.url("/api/chat"))
                .json(&body)
                .send()
                .await
                .unwrap();
            let status = response.status().as_u16();
            (status, response.json().await.unwrap())
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    #[tokio::test]
    async fn health_and_index() {
        let server = TestServer::start().await;
        let health = server.client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");

        let index = server.client.get(server.url("/")).send().await.unwrap();
        assert_eq!(index.status().as_u16(), 200);
        assert!(index.text().await.unwrap().contains("Chatbot de Anhelados"));
    }

    #[tokio::test]
    async fn chat_opens_and_continues_a_session() {
        let server = TestServer::start().await;

        let (status, first) = server.post_chat(json!({"message": "Hola"})).await;
        assert_eq!(status, 200);
        assert_eq!(first["reply"], "eco: Hola");
        let id = first["session_id"].as_str().unwrap().to_string();

        let (status, second) = server
            .post_chat(json!({"session_id": id, "message": "  ¿Horarios?  "}))
            .await;
        assert_eq!(status, 200);
        assert_eq!(second["session_id"], id.as_str());
        assert_eq!(
            second["history"],
            json!([
                {"role": "user", "content": "Hola"},
                {"role": "assistant", "content": "eco: Hola"},
                {"role": "user", "content": "¿Horarios?"},
                {"role": "assistant", "content": "eco: ¿Horarios?"},
            ])
        );

        let history: Value = server
            .client
            .get(server.url(&format!("/api/history/{id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history["history"], second["history"]);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let server = TestServer::start().await;
        let (_, a) = server.post_chat(json!({"message": "uno"})).await;
        let (_, b) = server.post_chat(json!({"message": "dos"})).await;
        assert_ne!(a["session_id"], b["session_id"]);
        assert_eq!(b["history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejects_bad_requests() {
        let server = TestServer::start().await;

        let (status, body) = server.post_chat(json!({"message": "   "})).await;
        assert_eq!(status, 400);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "bad_request");

        let (status, _) = server
            .post_chat(json!({"session_id": "no-es-uuid", "message": "hola"}))
            .await;
        assert_eq!(status, 400);

        let unknown = SessionId::new();
        let (status, body) = server
            .post_chat(json!({"session_id": unknown.to_string(), "message": "hola"}))
            .await;
        assert_eq!(status, 404);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn model_failure_is_bad_gateway() {
        let server = TestServer::start().await;
        let (status, body) = server.post_chat(json!({"message": "falla"})).await;
        assert_eq!(status, 502);
        assert_eq!(body["error"]["code"], "model");
    }

    #[tokio::test]
    async fn failed_first_turn_keeps_no_session() {
        let server = TestServer::start().await;
        for _ in 0..3 {
            let (status, body) = server.post_chat(json!({"message": "falla"})).await;
            assert_eq!(status, 502);
            assert!(body.get("session_id").is_none());
        }
        assert_eq!(server.open_sessions().await, 0);

        let (status, _) = server.post_chat(json!({"message": "Hola"})).await;
        assert_eq!(status, 200);
        assert_eq!(server.open_sessions().await, 1);
    }

    #[tokio::test]
    async fn failed_later_turn_keeps_the_session() {
        let server = TestServer::start().await;
        let (_, first) = server.post_chat(json!({"message": "Hola"})).await;
        let id = first["session_id"].clone();

        let (status, _) = server
            .post_chat(json!({"session_id": id, "message": "falla"}))
            .await;
        assert_eq!(status, 502);

        let (status, body) = server
            .post_chat(json!({"session_id": id, "message": "otra vez"}))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["history"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let server = TestServer::with_limits(SessionLimits {
            idle_ttl: Duration::ZERO,
            max_sessions: 10,
        })
        .await;
        let (_, first) = server.post_chat(json!({"message": "Hola"})).await;
        let id = first["session_id"].clone();

        assert_eq!(server.history_status(&id).await, 404);
        assert_eq!(server.open_sessions().await, 0);

        let (status, _) = server
            .post_chat(json!({"session_id": id, "message": "¿sigues ahí?"}))
            .await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn least_recently_used_session_is_evicted_when_full() {
        let server = TestServer::with_limits(SessionLimits {
            idle_ttl: Duration::from_secs(600),
            max_sessions: 2,
        })
        .await;
        let (_, a) = server.post_chat(json!({"message": "uno"})).await;
        let (_, b) = server.post_chat(json!({"message": "dos"})).await;

        // Touch `a` so `b` becomes the oldest.
        assert_eq!(server.history_status(&a["session_id"]).await, 200);

        let (_, c) = server.post_chat(json!({"message": "tres"})).await;
        assert_eq!(server.open_sessions().await, 2);
        assert_eq!(server.history_status(&a["session_id"]).await, 200);
        assert_eq!(server.history_status(&b["session_id"]).await, 404);
        assert_eq!(server.history_status(&c["session_id"]).await, 200);
    }
}
