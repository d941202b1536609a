use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::ApiKeyRow;
use crate::settings::api_keys;
use crate::settings::store::{self, UserSettings};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateApiKeyRequest {
    pub label: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApiKey {
    /// Plaintext key; shown once.
    pub key: String,
    pub api_key: ApiKeyRow,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyListResponse {
    pub api_keys: Vec<ApiKeyRow>,
}

/// GET /api/settings
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserSettings>, AppError> {
    Ok(Json(store::get(&state.db, &user.user_id).await?))
}

/// PUT /api/settings
pub async fn handle_put(
    State(state): State<AppState>,
    user: AuthUser,
    Json(patch): Json<Value>,
) -> Result<Json<UserSettings>, AppError> {
    let current = store::get(&state.db, &user.user_id).await?;
    let next = current.merged(&patch).map_err(AppError::Validation)?;
    store::put(&state.db, &user.user_id, &next).await?;
    Ok(Json(next))
}

/// GET /api/settings/api-keys
pub async fn handle_list_keys(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiKeyListResponse>, AppError> {
    let api_keys = api_keys::list(&state.db, &user.user_id).await?;
    Ok(Json(ApiKeyListResponse { api_keys }))
}

/// POST /api/settings/api-keys
pub async fn handle_create_key(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<CreateApiKeyRequest>>,
) -> Result<(StatusCode, Json<CreatedApiKey>), AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let (api_key, key) = api_keys::create(&state.db, &user.user_id, req.label.as_deref()).await?;
    info!("API key {} created for {}", api_key.id, user.user_id);
    Ok((StatusCode::CREATED, Json(CreatedApiKey { key, api_key })))
}

/// DELETE /api/settings/api-keys/:id
pub async fn handle_delete_key(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !api_keys::delete(&state.db, &user.user_id, id).await? {
        return Err(AppError::NotFound(format!("API key {id} not found")));
    }
    info!("API key {} revoked by {}", id, user.user_id);
    Ok(StatusCode::NO_CONTENT)
}
