use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::team::{TeamInviteRow, TeamMemberRow, TeamRow};
use crate::state::AppState;
use crate::teams::store;

#[derive(Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct TeamWithMembers {
    #[serde(flatten)]
    pub team: TeamRow,
    pub members: Vec<TeamMemberRow>,
}

#[derive(Serialize)]
pub struct TeamListResponse {
    pub teams: Vec<TeamWithMembers>,
}

/// GET /api/teams
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<TeamListResponse>, AppError> {
    let mut teams = Vec::new();
    for team in store::list_for_user(&state.db, &user.user_id).await? {
        let members = store::members(&state.db, &team.team_id).await?;
        teams.push(TeamWithMembers { team, members });
    }
    Ok(Json(TeamListResponse { teams }))
}

/// POST /api/teams
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamRow>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    let team = store::create(&state.db, &user.user_id, &req.name).await?;
    info!("Team {} created by {}", team.team_id, user.user_id);
    Ok((StatusCode::CREATED, Json(team)))
}

/// POST /api/teams/:id/invites
pub async fn handle_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(team_id): Path<String>,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<TeamInviteRow>), AppError> {
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }

    let member = store::membership(&state.db, &team_id, &user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team {team_id} not found")))?;
    if !store::can_invite(&member.role) {
        return Err(AppError::Forbidden("Only team owners and admins can invite".into()));
    }

    let invite = store::create_invite(
        &state.db,
        &team_id,
        email,
        &user.user_id,
        store::invite_expiry(Utc::now()),
    )
    .await?;
    info!("Invite to {} created for {}", team_id, invite.email);
    Ok((StatusCode::CREATED, Json(invite)))
}

/// POST /api/invites/:token/accept
pub async fn handle_accept(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<TeamMemberRow>, AppError> {
    let invite = store::get_invite(&state.db, &token)
        .await?
        .filter(|i| store::is_invite_usable(i, Utc::now()))
        .ok_or_else(|| AppError::NotFound("Invite not found or expired".into()))?;

    let email = store::user_email(&state.db, &user.user_id).await?;
    if !email.is_some_and(|e| e.eq_ignore_ascii_case(&invite.email)) {
        return Err(AppError::Forbidden("This invite was sent to a different email".into()));
    }

    let member = store::accept_invite(&state.db, &invite, &user.user_id).await?;
    info!("{} joined team {}", user.user_id, invite.team_id);
    Ok(Json(member))
}
