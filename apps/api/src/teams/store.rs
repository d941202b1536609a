use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::team::{TeamInviteRow, TeamMemberRow, TeamRow};

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";
pub const INVITE_TTL_DAYS: i64 = 7;

pub fn can_invite(role: &str) -> bool {
    role == ROLE_OWNER || role == ROLE_ADMIN
}

pub fn invite_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(INVITE_TTL_DAYS)
}

pub fn is_invite_usable(invite: &TeamInviteRow, now: DateTime<Utc>) -> bool {
    invite.accepted_at.is_none() && invite.expires_at > now
}

/// Creates the team and adds the creator as owner.
pub async fn create(pool: &PgPool, owner_id: &str, name: &str) -> Result<TeamRow> {
    let mut tx = pool.begin().await?;
    let team = sqlx::query_as::<_, TeamRow>(
        "INSERT INTO teams (team_id, name, owner_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name.trim())
    .bind(owner_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO team_members (team_id, user_id, role) VALUES ($1, $2, $3)")
        .bind(&team.team_id)
        .bind(owner_id)
        .bind(ROLE_OWNER)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(team)
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<TeamRow>> {
    Ok(sqlx::query_as::<_, TeamRow>(
        r#"
        SELECT t.* FROM teams t
        JOIN team_members m ON m.team_id = t.team_id
        WHERE m.user_id = $1
        ORDER BY t.created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn members(pool: &PgPool, team_id: &str) -> Result<Vec<TeamMemberRow>> {
    Ok(sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE team_id = $1 ORDER BY joined_at",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?)
}

pub async fn member_ids(pool: &PgPool, team_id: &str) -> Result<Vec<String>> {
    Ok(
        sqlx::query_scalar("SELECT user_id FROM team_members WHERE team_id = $1 ORDER BY user_id")
            .bind(team_id)
            .fetch_all(pool)
            .await?,
    )
}

pub async fn membership(pool: &PgPool, team_id: &str, user_id: &str) -> Result<Option<TeamMemberRow>> {
    Ok(sqlx::query_as::<_, TeamMemberRow>(
        "SELECT * FROM team_members WHERE team_id = $1 AND user_id = $2",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn create_invite(
    pool: &PgPool,
    team_id: &str,
    email: &str,
    invited_by: &str,
    expires_at: DateTime<Utc>,
) -> Result<TeamInviteRow> {
    Ok(sqlx::query_as::<_, TeamInviteRow>(
        r#"
        INSERT INTO team_invites (token, team_id, email, invited_by, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().simple().to_string())
    .bind(team_id)
    .bind(email.trim().to_lowercase())
    .bind(invited_by)
    .bind(expires_at)
    .fetch_one(pool)
    .await?)
}

pub async fn get_invite(pool: &PgPool, token: &str) -> Result<Option<TeamInviteRow>> {
    Ok(
        sqlx::query_as::<_, TeamInviteRow>("SELECT * FROM team_invites WHERE token = $1")
            .bind(token)
            .fetch_optional(pool)
            .await?,
    )
}

/// Marks the invite used and adds the member. Existing members keep their role.
pub async fn accept_invite(pool: &PgPool, invite: &TeamInviteRow, user_id: &str) -> Result<TeamMemberRow> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE team_invites SET accepted_at = NOW() WHERE token = $1")
        .bind(&invite.token)
        .execute(&mut *tx)
        .await?;

    let member = sqlx::query_as::<_, TeamMemberRow>(
        r#"
        INSERT INTO team_members (team_id, user_id, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (team_id, user_id) DO UPDATE SET role = team_members.role
        RETURNING *
        "#,
    )
    .bind(&invite.team_id)
    .bind(user_id)
    .bind(ROLE_MEMBER)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(member)
}

pub async fn user_email(pool: &PgPool, user_id: &str) -> Result<Option<String>> {
    Ok(sqlx::query_scalar("SELECT email FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(expires_in_days: i64, accepted: bool) -> TeamInviteRow {
        let now = Utc::now();
        TeamInviteRow {
            token: "t".into(),
            team_id: "team".into(),
            email: "a@b.c".into(),
            invited_by: "u1".into(),
            expires_at: now + Duration::days(expires_in_days),
            accepted_at: accepted.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn test_only_owners_and_admins_invite() {
        assert!(can_invite("owner"));
        assert!(can_invite("admin"));
        assert!(!can_invite("member"));
    }

    #[test]
    fn test_invite_usable() {
        let now = Utc::now();
        assert!(is_invite_usable(&invite(3, false), now));
        assert!(!is_invite_usable(&invite(-1, false), now));
        assert!(!is_invite_usable(&invite(3, true), now));
    }

    #[test]
    fn test_invite_expires_after_a_week() {
        let now = Utc::now();
        assert_eq!(invite_expiry(now) - now, Duration::days(7));
    }
}
