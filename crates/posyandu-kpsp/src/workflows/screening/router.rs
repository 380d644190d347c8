use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::backend::{BackendError, ScopedBackend};
use super::domain::{ChildId, QuestionId};
use super::registry::{SessionId, SessionRegistry, SharedSession};
use super::session::{ScreeningSession, SessionError};
use crate::auth::SessionContext;
use super::views::WizardView;

/// Router builder exposing the screening wizard as a JSON API.
pub fn screening_router<B>(registry: Arc<SessionRegistry<B>>) -> Router
where
    B: ScopedBackend + 'static,
{
    Router::new()
        .route("/api/v1/screening/sessions", post(create_handler::<B>))
        .route(
            "/api/v1/screening/sessions/:session_id",
            get(view_handler::<B>).delete(discard_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/children/:child_id",
            post(select_child_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/confirm",
            post(confirm_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/answer",
            post(answer_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/next",
            post(next_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/previous",
            post(previous_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/edit",
            post(edit_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/notes",
            put(notes_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/submit",
            post(submit_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/retry",
            post(retry_handler::<B>),
        )
        .route(
            "/api/v1/screening/sessions/:session_id/reset",
            post(reset_handler::<B>),
        )
        .with_state(registry)
}

/// Body returned by every session endpoint.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub view: WizardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerRequest {
    pub answer: bool,
    #[serde(default)]
    pub question_id: Option<QuestionId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// 422 for input problems, 409 for out-of-order calls, 502/401 for the backend.
pub(crate) fn error_status(error: &SessionError) -> StatusCode {
    match error {
        SessionError::Wizard(error) if error.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Wizard(_) => StatusCode::CONFLICT,
        SessionError::Backend(BackendError::Unauthorized) => StatusCode::UNAUTHORIZED,
        SessionError::Backend(_) => StatusCode::BAD_GATEWAY,
    }
}

fn respond(
    session_id: SessionId,
    view: WizardView,
    outcome: Result<StatusCode, SessionError>,
) -> Response {
    let (status, error) = match outcome {
        Ok(status) => (status, None),
        Err(error) => (error_status(&error), Some(error.to_string())),
    };

    let body = SessionResponse {
        session_id,
        view,
        error,
    };
    (status, axum::Json(body)).into_response()
}

/// Bearer token of the request, if any, as the credential for a new session.
pub(crate) fn credential_from(headers: &HeaderMap) -> SessionContext {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map_or_else(SessionContext::anonymous, SessionContext::with_token)
}

/// Session operations that wait on the backend.
enum Operation {
    LoadChildren,
    SelectChild(ChildId),
    Submit,
    Retry,
    NewAssessment,
}

impl Operation {
    async fn run<B>(self, session: &mut ScreeningSession<B>) -> Result<(), SessionError>
    where
        B: ScopedBackend + 'static,
    {
        match self {
            Self::LoadChildren => session.load_children().await,
            Self::SelectChild(child_id) => session.select_child(&child_id).await,
            Self::Submit => session.submit().await.map(|_| ()),
            Self::Retry => session.retry().await,
            Self::NewAssessment => session.new_assessment().await,
        }
    }
}

/// Runs `operation` on its own task; it finishes even if the client hangs up.
async fn run_detached<B>(
    session_id: SessionId,
    shared: SharedSession<B>,
    operation: Operation,
    success: StatusCode,
) -> Response
where
    B: ScopedBackend + 'static,
{
    let task = tokio::spawn(async move {
        let mut session = shared.lock_owned().await;
        let outcome = operation.run(&mut *session).await;
        (outcome, session.view())
    });

    match task.await {
        Ok((outcome, view)) => respond(session_id, view, outcome.map(|()| success)),
        Err(err) => {
            error!(session_id = %session_id, error = %err, "screening task aborted");
            let payload = json!({
                "session_id": session_id,
                "error": "screening task aborted",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn not_found(session_id: &SessionId) -> Response {
    let payload = json!({
        "session_id": session_id,
        "error": "screening session not found",
    });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}

async fn lookup<B>(
    registry: &SessionRegistry<B>,
    session_id: &SessionId,
) -> Result<SharedSession<B>, Response>
where
    B: ScopedBackend + 'static,
{
    registry
        .get(session_id)
        .await
        .ok_or_else(|| not_found(session_id))
}

/// Runs a synchronous wizard operation under the session lock.
async fn apply<B, F>(registry: &SessionRegistry<B>, session_id: String, action: F) -> Response
where
    B: ScopedBackend + 'static,
    F: FnOnce(&mut ScreeningSession<B>) -> Result<(), SessionError>,
{
    let session_id = SessionId(session_id);
    let shared = match lookup(registry, &session_id).await {
        Ok(shared) => shared,
        Err(response) => return response,
    };

    let mut session = shared.lock().await;
    let outcome = action(&mut *session).map(|()| StatusCode::OK);
    respond(session_id, session.view(), outcome)
}

pub(crate) async fn create_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    headers: HeaderMap,
) -> Response
where
    B: ScopedBackend + 'static,
{
    let (session_id, shared) = registry.create(credential_from(&headers)).await;
    run_detached(session_id, shared, Operation::LoadChildren, StatusCode::CREATED).await
}

async fn detached<B>(
    registry: &SessionRegistry<B>,
    session_id: String,
    operation: Operation,
) -> Response
where
    B: ScopedBackend + 'static,
{
    let session_id = SessionId(session_id);
    match lookup(registry, &session_id).await {
        Ok(shared) => run_detached(session_id, shared, operation, StatusCode::OK).await,
        Err(response) => response,
    }
}

pub(crate) async fn view_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    apply(&registry, session_id, |_| Ok(())).await
}

pub(crate) async fn discard_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    let session_id = SessionId(session_id);
    if registry.remove(&session_id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(&session_id)
    }
}

pub(crate) async fn select_child_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path((session_id, child_id)): Path<(String, String)>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    detached(&registry, session_id, Operation::SelectChild(ChildId(child_id))).await
}

pub(crate) async fn confirm_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    apply(&registry, session_id, ScreeningSession::confirm).await
}

pub(crate) async fn answer_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<AnswerRequest>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    apply(&registry, session_id, |session| match &request.question_id {
        Some(question_id) => session.answer_question(question_id, request.answer),
        None => session.answer(request.answer),
    })
    .await
}

pub(crate) async fn next_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    apply(&registry, session_id, |session| session.next().map(|_| ())).await
}

pub(crate) async fn previous_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    apply(&registry, session_id, ScreeningSession::previous).await
}

pub(crate) async fn edit_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    apply(&registry, session_id, ScreeningSession::edit).await
}

pub(crate) async fn notes_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<NotesRequest>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    apply(&registry, session_id, |session| session.set_notes(request.notes)).await
}

pub(crate) async fn submit_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    detached(&registry, session_id, Operation::Submit).await
}

pub(crate) async fn retry_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    detached(&registry, session_id, Operation::Retry).await
}

pub(crate) async fn reset_handler<B>(
    State(registry): State<Arc<SessionRegistry<B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    B: ScopedBackend + 'static,
{
    detached(&registry, session_id, Operation::NewAssessment).await
}
