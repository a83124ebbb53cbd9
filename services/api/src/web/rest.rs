//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. This layer is the narrow
//! interface the (out-of-scope) presentation client calls: every handler
//! applies exactly one orchestrator event and returns a fresh session
//! snapshot for the client to re-render from.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{fill_task, state::AppState};
use tutor_core::domain::{AiAction, ChatMessage, Goal, Question, StudentProfile};
use tutor_core::session::{SessionOrchestrator, SessionView};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_session_handler,
        onboarding_handler,
        complete_diagnostic_handler,
        select_topic_handler,
        complete_quiz_handler,
        new_topic_handler,
        chat_handler,
    ),
    components(
        schemas(
            SessionSnapshot,
            OnboardingRequest,
            DiagnosticRequest,
            TopicRequest,
            QuizRequest,
            ChatSendRequest,
            ChatReply,
        )
    ),
    tags(
        (name = "Adaptive Tutor API", description = "API endpoints for the adaptive tutoring session.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Everything the client needs to render the current view.
#[derive(Serialize, ToSchema)]
pub struct SessionSnapshot {
    #[schema(value_type = String)]
    view: SessionView,
    #[schema(value_type = Option<Object>)]
    profile: Option<StudentProfile>,
    /// The in-flight question batch (diagnostic or quiz, depending on the
    /// view).
    #[schema(value_type = Vec<Object>)]
    questions: Vec<Question>,
    #[schema(value_type = Option<Object>)]
    current_action: Option<AiAction>,
    /// True while the current action's study content is still being
    /// generated in the background.
    action_fill_pending: bool,
    mastery: HashMap<String, u8>,
    #[schema(value_type = Vec<Object>)]
    chat_log: Vec<ChatMessage>,
    current_topic: Option<String>,
}

impl SessionSnapshot {
    fn of(session: &SessionOrchestrator) -> Self {
        Self {
            view: session.view(),
            profile: session.profile().cloned(),
            questions: session.questions().to_vec(),
            current_action: session.current_action().cloned(),
            action_fill_pending: session.action_fill_pending(),
            mastery: session
                .mastery()
                .iter()
                .map(|(topic, score)| (topic.to_string(), score))
                .collect(),
            chat_log: session.chat_log().to_vec(),
            current_topic: session.current_topic().map(str::to_string),
        }
    }
}

/// The onboarding form payload. The student id is generated server-side,
/// once, and never reassigned.
#[derive(Deserialize, ToSchema)]
pub struct OnboardingRequest {
    name: String,
    class_level: String,
    subject: String,
    #[schema(value_type = String)]
    goal: Goal,
    language: String,
    daily_time_minutes: Option<u32>,
}

/// The selected option index for each diagnostic question, in order.
#[derive(Deserialize, ToSchema)]
pub struct DiagnosticRequest {
    answers: Vec<usize>,
}

#[derive(Deserialize, ToSchema)]
pub struct TopicRequest {
    subject: String,
    topic: String,
}

/// The tally of a finished quiz.
#[derive(Deserialize, ToSchema)]
pub struct QuizRequest {
    correct: usize,
    total: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct ChatSendRequest {
    message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatReply {
    reply: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Returns the current session snapshot.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "The current session state", body = SessionSnapshot)
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    Json(SessionSnapshot::of(&session))
}

/// Submits the onboarding form and moves into the diagnostic (or straight
/// to topic selection when diagnostic generation fails).
#[utoipa::path(
    post,
    path = "/session/onboarding",
    request_body = OnboardingRequest,
    responses(
        (status = 200, description = "Profile created", body = SessionSnapshot)
    )
)]
pub async fn onboarding_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<OnboardingRequest>,
) -> impl IntoResponse {
    let profile = StudentProfile {
        id: Uuid::new_v4(),
        name: body.name,
        class_level: body.class_level,
        subject: body.subject,
        goal: body.goal,
        language: body.language,
        daily_time_minutes: body.daily_time_minutes,
    };
    info!(student = %profile.id, "onboarding submitted");

    let mut session = app_state.session.lock().await;
    session.complete_onboarding(profile).await;
    Json(SessionSnapshot::of(&session))
}

/// Submits the diagnostic answers. The answers are advisory only and have
/// no mastery effect.
#[utoipa::path(
    post,
    path = "/session/diagnostic",
    request_body = DiagnosticRequest,
    responses(
        (status = 200, description = "Diagnostic recorded", body = SessionSnapshot)
    )
)]
pub async fn complete_diagnostic_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<DiagnosticRequest>,
) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.complete_diagnostic(&body.answers);
    Json(SessionSnapshot::of(&session))
}

/// Selects a topic and generates its quiz. The response is only sent once
/// generation resolves (or degrades to the fallback quiz), so the client
/// shows its loading state for the duration of this call.
#[utoipa::path(
    post,
    path = "/session/topic",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "Quiz ready", body = SessionSnapshot)
    )
)]
pub async fn select_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<TopicRequest>,
) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.select_topic(&body.subject, &body.topic).await;
    Json(SessionSnapshot::of(&session))
}

/// Completes the quiz. The snapshot returned already shows the dashboard
/// with the pending action; the study content is filled in by a background
/// task and picked up by a later `GET /session`.
#[utoipa::path(
    post,
    path = "/session/quiz",
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Quiz scored, dashboard ready", body = SessionSnapshot)
    )
)]
pub async fn complete_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<QuizRequest>,
) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    let ticket = session.complete_quiz(body.correct, body.total).await;
    let snapshot = SessionSnapshot::of(&session);

    if let (Some(ticket), Some(profile)) = (ticket, session.profile().cloned()) {
        tokio::spawn(fill_task::run_action_fill(
            Arc::clone(&app_state.session),
            profile,
            ticket,
        ));
    }
    Json(snapshot)
}

/// Leaves the dashboard for a new topic selection, discarding the current
/// action.
#[utoipa::path(
    post,
    path = "/session/new-topic",
    responses(
        (status = 200, description = "Back at topic selection", body = SessionSnapshot)
    )
)]
pub async fn new_topic_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.start_new_topic();
    Json(SessionSnapshot::of(&session))
}

/// Sends one tutor-chat message and waits for the reply. The user message
/// is appended before the provider call, so interleaved sends land in the
/// log in send order; a failed call yields the fixed apology reply.
#[utoipa::path(
    post,
    path = "/session/chat",
    request_body = ChatSendRequest,
    responses(
        (status = 200, description = "The tutor's reply", body = ChatReply),
        (status = 409, description = "Chat is only available on the dashboard")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<ChatSendRequest>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    let (request, provider) = {
        let mut session = app_state.session.lock().await;
        let request = session.push_chat_message(&body.message);
        (request, session.provider())
    };
    let Some(request) = request else {
        return Err((
            StatusCode::CONFLICT,
            "Chat is only available on the dashboard".to_string(),
        ));
    };

    // The provider round-trip runs without holding the session, so other
    // events (including further chat sends) stay responsive.
    let outcome = provider
        .chat(
            &request.profile,
            &request.history,
            &request.message,
            &request.topic,
        )
        .await;

    let mut session = app_state.session.lock().await;
    session.apply_chat_reply(request.generation, outcome);
    let reply = session
        .chat_log()
        .last()
        .map(|entry| entry.text.clone())
        .unwrap_or_default();
    Ok(Json(ChatReply { reply }))
}
