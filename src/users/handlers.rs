use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    middleware,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::{require_auth, AuthUser},
    error::{AppError, UNAUTHORIZED},
    state::AppState,
    users::dto::{DeleteResponse, Pagination, PublicUser, UsersPage},
};

/// Routes that need a verified bearer token.
pub fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/me", get(get_me))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[instrument(skip(state, caller, query), fields(caller_id = %caller.user_id))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<UsersPage>, AppError> {
    let Query(pagination) = query.map_err(|e| {
        warn!(error = %e, "bad pagination query");
        AppError::BadRequest("page and limit must be integers".into())
    })?;

    let total = state.users.count().await?;
    let users = state
        .users
        .list(pagination.limit(), pagination.offset())
        .await?;

    let items = users.into_iter().map(PublicUser::from).collect();
    Ok(Json(UsersPage::new(items, &pagination, total)))
}

#[instrument(skip(state, caller), fields(caller_id = %caller.user_id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    // An id that is not a UUID cannot name a user.
    let target = Uuid::parse_str(&id).map_err(|_| AppError::NotFound)?;

    if state.users.find_by_id(target).await?.is_none() {
        return Err(AppError::NotFound);
    }
    if !caller.can_manage(target) {
        warn!(%target, role = %caller.role, "delete forbidden");
        return Err(AppError::Forbidden);
    }

    // Another request may have deleted it in between.
    if !state.users.delete(target).await? {
        return Err(AppError::NotFound);
    }

    info!(%target, "user deleted");
    Ok(Json(DeleteResponse {
        message: "user deleted",
        id: target,
    }))
}

#[instrument(skip(state, caller), fields(caller_id = %caller.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state.users.find_by_id(caller.user_id).await?.ok_or_else(|| {
        warn!("token refers to a user that no longer exists");
        AppError::Unauthorized(UNAUTHORIZED)
    })?;
    Ok(Json(user.into()))
}
