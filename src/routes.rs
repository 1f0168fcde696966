use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future, sync::Arc};
use uuid::Uuid;

use crate::{
    error::{ApiError, Rejection},
    gateway::GenerationGateway,
    images::ReferenceImage,
    models::{InputPatch, Platform, PlatformInfo},
    wizard::{Settled, Wizard, WizardView},
};

pub struct Session {
    pub wizard: Wizard,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub gateway: Arc<dyn GenerationGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self { sessions: Arc::default(), gateway }
    }

    /// Runs `f` on the session's wizard under the write lock. The lock is
    /// released before this returns, so callers may await afterwards.
    fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut Wizard) -> Result<T, Rejection>) -> Result<T, ApiError> {
        let mut guard = self.sessions.write();
        let session = guard.get_mut(&id).ok_or(ApiError::NotFound)?;
        let out = f(&mut session.wizard)?;
        session.updated_at = Utc::now();
        Ok(out)
    }

    /// Runs a gateway call together with its settle step on a spawned task.
    /// The handler only awaits the join handle, so a client that disconnects
    /// mid-call still gets its busy flag or image slot released.
    async fn settle_detached<F>(&self, work: F) -> Result<Settled, ApiError>
    where
        F: Future<Output = Result<Settled, ApiError>> + Send + 'static,
    {
        tokio::spawn(work).await.map_err(|e| {
            tracing::error!("❌ Gateway task failed: {}", e);
            ApiError::Internal(e.to_string())
        })?
    }

    fn snapshot(&self, id: Uuid) -> Result<Json<SessionView>, ApiError> {
        let guard = self.sessions.read();
        let session = guard.get(&id).ok_or(ApiError::NotFound)?;
        Ok(Json(SessionView::new(id, session)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub wizard: WizardView,
}

impl SessionView {
    fn new(id: Uuid, session: &Session) -> Self {
        Self { id, created_at: session.created_at, updated_at: session.updated_at, wizard: session.wizard.view() }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectPlatformRequest {
    pub platform: Platform,
}

#[derive(Debug, Deserialize)]
pub struct CompetitorUrlRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectPlanRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceImageRequest {
    /// Raw base64 or a `data:image/...;base64,` URL.
    pub data: String,
}

type ViewResult = Result<Json<SessionView>, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/platforms", get(list_platforms))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/platform", post(select_platform))
        .route("/api/sessions/:id/input", put(update_input))
        .route("/api/sessions/:id/competitors", post(add_competitor))
        .route("/api/sessions/:id/competitors/:index", put(set_competitor).delete(remove_competitor))
        .route("/api/sessions/:id/extract", post(extract_product))
        .route("/api/sessions/:id/diagnosis", post(start_diagnosis))
        .route("/api/sessions/:id/optimization", post(generate_plans))
        .route("/api/sessions/:id/plan", post(select_plan))
        .route("/api/sessions/:id/reference-image", put(upload_reference_image))
        .route("/api/sessions/:id/images/:image_id", post(generate_image))
        .route("/api/sessions/:id/reset", post(reset_session))
        .with_state(state)
}

pub async fn list_platforms() -> Json<Vec<PlatformInfo>> {
    Json(Platform::ALL.into_iter().map(PlatformInfo::from).collect())
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let session = Session { wizard: Wizard::new(), created_at: now, updated_at: now };
    let view = SessionView::new(id, &session);
    state.sessions.write().insert(id, session);
    tracing::info!("🎯 Created wizard session {}", id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.snapshot(id)
}

pub async fn select_platform(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<SelectPlatformRequest>,
) -> ViewResult {
    state.update(id, |w| w.select_platform(body.platform))?;
    state.snapshot(id)
}

pub async fn update_input(Path(id): Path<Uuid>, State(state): State<AppState>, Json(patch): Json<InputPatch>) -> ViewResult {
    state.update(id, |w| w.update_input(patch))?;
    state.snapshot(id)
}

pub async fn add_competitor(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.update(id, |w| w.add_competitor_url())?;
    state.snapshot(id)
}

pub async fn set_competitor(
    Path((id, index)): Path<(Uuid, usize)>,
    State(state): State<AppState>,
    Json(body): Json<CompetitorUrlRequest>,
) -> ViewResult {
    state.update(id, |w| w.set_competitor_url(index, body.url))?;
    state.snapshot(id)
}

pub async fn remove_competitor(Path((id, index)): Path<(Uuid, usize)>, State(state): State<AppState>) -> ViewResult {
    state.update(id, |w| w.remove_competitor_url(index))?;
    state.snapshot(id)
}

pub async fn extract_product(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    let ticket = state.update(id, |w| w.begin_extraction())?;
    let task = state.clone();
    state
        .settle_detached(async move {
            let outcome = task.gateway.extract_product_info(&ticket.url).await;
            task.update(id, |w| Ok(w.settle_extraction(ticket, outcome)))
        })
        .await?;
    state.snapshot(id)
}

pub async fn start_diagnosis(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    let ticket = state.update(id, |w| w.begin_diagnosis())?;
    let task = state.clone();
    state
        .settle_detached(async move {
            let outcome = task.gateway.perform_diagnosis(ticket.platform, &ticket.input).await;
            task.update(id, |w| Ok(w.settle_diagnosis(ticket, outcome)))
        })
        .await?;
    state.snapshot(id)
}

pub async fn generate_plans(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    let ticket = state.update(id, |w| w.begin_optimization())?;
    let task = state.clone();
    state
        .settle_detached(async move {
            let outcome = task
                .gateway
                .generate_optimizations(ticket.platform, &ticket.input, &ticket.diagnosis)
                .await;
            task.update(id, |w| Ok(w.settle_optimization(ticket, outcome)))
        })
        .await?;
    state.snapshot(id)
}

pub async fn select_plan(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<SelectPlanRequest>,
) -> ViewResult {
    state.update(id, |w| w.select_plan(body.index))?;
    state.snapshot(id)
}

pub async fn upload_reference_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ReferenceImageRequest>,
) -> ViewResult {
    let image = ReferenceImage::from_base64(&body.data).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.update(id, |w| w.set_reference_image(image))?;
    state.snapshot(id)
}

pub async fn generate_image(Path((id, image_id)): Path<(Uuid, u32)>, State(state): State<AppState>) -> ViewResult {
    let ticket = state.update(id, |w| w.begin_image(image_id))?;
    let task = state.clone();
    state
        .settle_detached(async move {
            let outcome = task
                .gateway
                .generate_listing_image(&ticket.reference, &ticket.plan, &ticket.product_description)
                .await;
            task.update(id, |w| Ok(w.settle_image(ticket, outcome)))
        })
        .await?;
    state.snapshot(id)
}

pub async fn reset_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> ViewResult {
    state.update(id, |w| {
        w.reset();
        Ok(())
    })?;
    state.snapshot(id)
}
