//! REST endpoints driving the onboarding wizard.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use super::manager::{AdvanceOutcome, OnboardingManager};
use super::model::{NEED_OPTIONS, ResponsePatch, ResponseUpdate};
use super::steps::{ONBOARDING_STEPS, StepId};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

fn error(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

async fn snapshot(state: &OnboardingRouteState) -> axum::response::Response {
    Json(state.manager.snapshot().await).into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "hub-onboarding"
    }))
}

// ── Session ─────────────────────────────────────────────────────────────

/// GET /api/onboarding/steps
async fn list_steps() -> impl IntoResponse {
    Json(serde_json::json!({
        "steps": ONBOARDING_STEPS,
        "need_options": NEED_OPTIONS,
    }))
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    snapshot(&state).await
}

/// POST /api/onboarding/start
///
/// The optional body carries values already known about the user; blank
/// fields are then filled from the prefill resolver.
async fn start(
    State(state): State<OnboardingRouteState>,
    body: Option<Json<ResponsePatch>>,
) -> impl IntoResponse {
    let patch = body.map(|Json(p)| p).unwrap_or_default();
    state.manager.start(patch).await;
    snapshot(&state).await
}

/// POST /api/onboarding/responses
async fn update_response(
    State(state): State<OnboardingRouteState>,
    Json(update): Json<ResponseUpdate>,
) -> impl IntoResponse {
    state.manager.update_response(update).await;
    snapshot(&state).await
}

#[derive(Deserialize)]
struct NeedRequest {
    need: String,
}

/// POST /api/onboarding/needs/toggle
async fn toggle_need(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<NeedRequest>,
) -> impl IntoResponse {
    state.manager.toggle_need(&body.need).await;
    snapshot(&state).await
}

// ── Competencies ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CompetencyRequest {
    value: String,
}

async fn add_competency(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<CompetencyRequest>,
) -> impl IntoResponse {
    if !state.manager.add_competency(&body.value).await {
        return error(StatusCode::BAD_REQUEST, "Competency is blank");
    }
    snapshot(&state).await
}

async fn update_competency(
    State(state): State<OnboardingRouteState>,
    Path(index): Path<usize>,
    Json(body): Json<CompetencyRequest>,
) -> impl IntoResponse {
    if !state.manager.update_competency(index, &body.value).await {
        return error(StatusCode::NOT_FOUND, "No competency at that index");
    }
    snapshot(&state).await
}

async fn remove_competency(
    State(state): State<OnboardingRouteState>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    if !state.manager.remove_competency(index).await {
        return error(StatusCode::NOT_FOUND, "No competency at that index");
    }
    snapshot(&state).await
}

// ── Navigation ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GoToRequest {
    step: StepId,
}

/// POST /api/onboarding/goto
async fn go_to(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<GoToRequest>,
) -> impl IntoResponse {
    if !state.manager.go_to(body.step).await {
        return error(StatusCode::CONFLICT, "Onboarding has not started");
    }
    snapshot(&state).await
}

/// POST /api/onboarding/steps/{step}/complete
async fn complete_step(
    State(state): State<OnboardingRouteState>,
    Path(step): Path<String>,
) -> impl IntoResponse {
    let step = match step.parse::<StepId>() {
        Ok(step) => step,
        Err(e) => return error(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    state.manager.mark_step_complete(step).await;
    snapshot(&state).await
}

/// POST /api/onboarding/next
///
/// Gated: 422 while the current step's required fields are blank.
async fn next(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    match state.manager.advance().await {
        AdvanceOutcome::Blocked { step } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "Required fields are missing",
                "step": step,
            })),
        )
            .into_response(),
        outcome => Json(serde_json::json!({
            "result": outcome,
            "status": state.manager.snapshot().await,
        }))
        .into_response(),
    }
}

/// POST /api/onboarding/prev
async fn prev(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    state.manager.prev().await;
    snapshot(&state).await
}

/// POST /api/onboarding/complete
async fn complete(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let handoff = state.manager.complete().await;
    Json(handoff)
}

/// POST /api/onboarding/reset
async fn reset(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    state.manager.reset().await;
    snapshot(&state).await
}

// ── Conversation ────────────────────────────────────────────────────────

async fn start_conversation(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    match state.manager.begin_conversation().await {
        Some(greeting) => Json(serde_json::json!({
            "reply": greeting,
            "phase": state.manager.state().await.responses.conversation_phase,
        }))
        .into_response(),
        None => error(
            StatusCode::CONFLICT,
            "Conversation is only available once, on the goals step",
        ),
    }
}

#[derive(Deserialize)]
struct MessageRequest {
    text: String,
}

async fn post_message(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<MessageRequest>,
) -> impl IntoResponse {
    if body.text.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Message is empty");
    }
    match state.manager.submit_message(&body.text).await {
        Some(turn) => Json(turn).into_response(),
        None => error(StatusCode::CONFLICT, "Conversation is not active"),
    }
}

// ── Org chart / preview ─────────────────────────────────────────────────

async fn get_org_chart(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.org_chart_panel().await)
}

async fn refresh_org_chart(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    state.manager.refresh_org_chart().await;
    Json(state.manager.org_chart_panel().await)
}

async fn preview(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.manager.preview().await)
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(manager: Arc<OnboardingManager>) -> Router {
    let state = OnboardingRouteState { manager };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/steps", get(list_steps))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/start", post(start))
        .route("/api/onboarding/responses", post(update_response))
        .route("/api/onboarding/needs/toggle", post(toggle_need))
        .route("/api/onboarding/competencies", post(add_competency))
        .route(
            "/api/onboarding/competencies/{index}",
            put(update_competency).delete(remove_competency),
        )
        .route("/api/onboarding/goto", post(go_to))
        .route("/api/onboarding/steps/{step}/complete", post(complete_step))
        .route("/api/onboarding/next", post(next))
        .route("/api/onboarding/prev", post(prev))
        .route("/api/onboarding/complete", post(complete))
        .route("/api/onboarding/reset", post(reset))
        .route(
            "/api/onboarding/conversation/start",
            post(start_conversation),
        )
        .route("/api/onboarding/conversation/messages", post(post_message))
        .route("/api/onboarding/org-chart", get(get_org_chart))
        .route("/api/onboarding/org-chart/refresh", post(refresh_org_chart))
        .route("/api/onboarding/preview", get(preview))
        .with_state(state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        onboarding_routes(Arc::new(OnboardingManager::new(db, "u1")))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn start_without_body() {
        let app = app().await;
        let (code, status) = send(&app, "POST", "/api/onboarding/start", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status["status"], "in_progress");
        assert_eq!(status["current_title"], "Perfil");
    }

    #[tokio::test]
    async fn next_is_gated_on_profile() {
        let app = app().await;
        send(&app, "POST", "/api/onboarding/start", None).await;

        let (code, body) = send(&app, "POST", "/api/onboarding/next", None).await;
        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["step"], "profile");

        for (field, value) in [("full_name", "Ana"), ("email", "ana@x.com")] {
            let (code, _) = send(
                &app,
                "POST",
                "/api/onboarding/responses",
                Some(json!({"field": field, "value": value})),
            )
            .await;
            assert_eq!(code, StatusCode::OK);
        }

        let (code, body) = send(&app, "POST", "/api/onboarding/next", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"]["current_step"], "organization");
        assert_eq!(body["status"]["completed_steps"], json!(["welcome", "profile"]));
    }

    #[tokio::test]
    async fn unknown_field_is_rejected() {
        let app = app().await;
        let (code, _) = send(
            &app,
            "POST",
            "/api/onboarding/responses",
            Some(json!({"field": "shoe_size", "value": 42})),
        )
        .await;
        assert!(code.is_client_error());
    }

    #[tokio::test]
    async fn competency_edits_by_index() {
        let app = app().await;
        send(&app, "POST", "/api/onboarding/start", None).await;
        send(&app, "POST", "/api/onboarding/competencies", Some(json!({"value": "SQL"}))).await;
        send(&app, "POST", "/api/onboarding/competencies", Some(json!({"value": "Excel"}))).await;

        let (code, status) = send(
            &app,
            "PUT",
            "/api/onboarding/competencies/1",
            Some(json!({"value": "Power BI"})),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status["responses"]["competencies"], json!(["SQL", "Power BI"]));

        let (code, status) = send(&app, "DELETE", "/api/onboarding/competencies/0", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status["responses"]["competencies"], json!(["Power BI"]));

        let (code, _) = send(
            &app,
            "PUT",
            "/api/onboarding/competencies/9",
            Some(json!({"value": "x"})),
        )
        .await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }
}
