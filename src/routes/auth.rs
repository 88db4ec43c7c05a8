use crate::{
    error::AppError,
    models::*,
    routes::lessons::AppState,
};
use axum::{extract::State, http::StatusCode, Json};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserIdentity>), AppError> {
    let user = state.auth.register(&req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SignInResponse>, AppError> {
    let mut sync = state.sync.lock().await;
    let report = sync.sign_in(&credentials).await?;

    Ok(Json(SignInResponse {
        report,
        snapshot: sync.snapshot(),
    }))
}

pub async fn sign_out(State(state): State<AppState>) -> Result<Json<LessonSnapshot>, AppError> {
    let mut sync = state.sync.lock().await;
    sync.sign_out().await?;
    Ok(Json(sync.snapshot()))
}

pub async fn session(State(state): State<AppState>) -> Json<Session> {
    let sync = state.sync.lock().await;
    Json(sync.session().clone())
}
