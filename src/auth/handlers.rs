use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tokio::task::spawn_blocking;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::Identity,
        dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        jwt::JwtKeys,
        password::{hash_password, verify_dummy, verify_password},
        validation::{validate_login, validate_registration},
    },
    error::{AppError, INVALID_CREDENTIALS},
    state::AppState,
    users::{
        repo::StoreError,
        repo_types::{NewUser, Role},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Bodies that are not JSON objects never reach validation.
pub(crate) fn reject_body(e: JsonRejection) -> AppError {
    warn!(error = %e, "unreadable request body");
    AppError::BadRequest("request body must be a JSON object".into())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(payload) = payload.map_err(reject_body)?;
    let input = validate_registration(payload).inspect_err(|_| warn!("registration failed validation"))?;

    // Fast path only; the unique constraints decide on insert.
    if let Some(field) = state.users.find_taken(&input.username, &input.email).await? {
        warn!(%field, "registration conflict");
        return Err(StoreError::Duplicate(field).into());
    }

    let password = input.password;
    let password_hash = spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task")??;

    let user = state
        .users
        .create(NewUser {
            username: input.username,
            email: input.email,
            password_hash,
            role: Role::User,
        })
        .await
        .inspect_err(|e| {
            if let StoreError::Duplicate(field) = e {
                warn!(%field, "registration lost a uniqueness race");
            }
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user: user.into() }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload.map_err(reject_body)?;
    let input = validate_login(payload)?;
    let password = input.password;

    let Some(user) = state.users.find_by_email(&input.email).await? else {
        spawn_blocking(move || verify_dummy(&password))
            .await
            .context("password verification task")?;
        warn!("login for unknown account");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    };

    let hash = user.password_hash.clone();
    let matches = spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("password verification task")??;
    if !matches {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.issue(&Identity::from(&user))?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: keys.ttl().as_secs(),
        user: user.into(),
    }))
}
