use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::companies::store;
use crate::errors::AppError;
use crate::models::company::CompanyRow;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CompanyListResponse {
    pub companies: Vec<CompanyRow>,
    pub total: usize,
}

/// GET /api/companies
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CompanyListResponse>, AppError> {
    let companies = store::list_for_user(&state.db, &user.user_id).await?;
    Ok(Json(CompanyListResponse {
        total: companies.len(),
        companies,
    }))
}
