use actix_web::{HttpResponse, Responder, web};
use chatbot::{ChatSession, ModelCache, ModelSelection, SessionState, Transcript};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::ModelConfig,
    handler::{ApiError, models::selectable},
    session_store::{SessionStore, SharedSession},
};

#[derive(Serialize)]
pub struct SessionView {
    id: Uuid,
    state: SessionState,
    messages: Transcript,
}

impl SessionView {
    fn new(id: Uuid, session: &ChatSession) -> Self {
        Self {
            id,
            state: session.state(),
            messages: session.transcript().clone(),
        }
    }

    fn generating(id: Uuid, messages: Transcript) -> Self {
        Self {
            id,
            state: SessionState::Generating,
            messages,
        }
    }
}

#[derive(serde::Deserialize, Debug)]
pub struct SubmitMessageModel {
    #[serde(default)]
    model: Option<ModelSelection>,
    prompt: String,
}

fn find(sessions: &SessionStore, id: Uuid) -> Result<SharedSession, ApiError> {
    sessions.get(&id).ok_or(ApiError::SessionNotFound(id))
}

#[tracing::instrument(skip(sessions))]
pub async fn create_session(sessions: web::Data<SessionStore>) -> impl Responder {
    let (id, slot) = sessions.create();
    tracing::info!(session_id = %id, "Session created");
    let session = slot.lock().await;
    HttpResponse::Created().json(SessionView::new(id, &session))
}

pub async fn get_session(
    path: web::Path<Uuid>,
    sessions: web::Data<SessionStore>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    let slot = find(&sessions, id)?;

    let view = match slot.try_lock() {
        Ok(session) => SessionView::new(id, &session),
        Err(_) => match slot.running_turn() {
            Some(transcript) => SessionView::generating(id, transcript),
            // a clear holds the lock only briefly
            None => SessionView::new(id, &*slot.lock().await),
        },
    };
    Ok(web::Json(view))
}

#[tracing::instrument(skip(sessions))]
pub async fn delete_session(
    path: web::Path<Uuid>,
    sessions: web::Data<SessionStore>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    sessions.remove(&id).ok_or(ApiError::SessionNotFound(id))?;
    Ok(HttpResponse::NoContent().finish())
}

/// Runs one chat turn: acquire the selected model, then submit the prompt.
///
/// A model that fails to load stops the turn before anything is recorded. A
/// failed generation leaves the user message in the transcript; the client
/// re-reads the session to show it.
#[tracing::instrument(skip(body, sessions, models, config), fields(model))]
pub async fn submit_message(
    path: web::Path<Uuid>,
    body: web::Json<SubmitMessageModel>,
    sessions: web::Data<SessionStore>,
    models: web::Data<ModelCache>,
    config: web::Data<ModelConfig>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    let slot = find(&sessions, id)?;

    let selection = body.model.as_ref().unwrap_or(&config.default_model);
    tracing::Span::current().record("model", tracing::field::display(selection));
    let handle = models.acquire(selectable(selection)?).await?;

    let mut session = slot.try_lock().map_err(|_| ApiError::Busy)?;
    let _turn = slot.begin_turn(&session);
    session.submit(&body.prompt, handle.as_ref()).await?;

    Ok(web::Json(SessionView::new(id, &session)))
}

#[tracing::instrument(skip(sessions))]
pub async fn clear_messages(
    path: web::Path<Uuid>,
    sessions: web::Data<SessionStore>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    let slot = find(&sessions, id)?;

    let mut session = slot.try_lock().map_err(|_| ApiError::Busy)?;
    session.clear();
    tracing::info!(session_id = %id, "Chat cleared");

    Ok(web::Json(SessionView::new(id, &session)))
}
