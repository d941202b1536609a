//! Per-user settings, stored as JSON and read back with defaults filled in.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub briefings_enabled: bool,
    /// Local hour (0-23) the briefing should be ready by.
    pub briefing_hour: u8,
    pub timezone: String,
    pub auto_enrich_speakers: bool,
    pub show_generic_speakers: bool,
    pub default_visibility: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            briefings_enabled: true,
            briefing_hour: 7,
            timezone: "UTC".to_string(),
            auto_enrich_speakers: true,
            show_generic_speakers: false,
            default_visibility: "private".to_string(),
        }
    }
}

impl UserSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.briefing_hour > 23 {
            return Err("briefingHour must be between 0 and 23".into());
        }
        if self.timezone.trim().is_empty() {
            return Err("timezone must not be empty".into());
        }
        if !matches!(self.default_visibility.as_str(), "private" | "team") {
            return Err("defaultVisibility must be 'private' or 'team'".into());
        }
        Ok(())
    }

    /// Overlays the keys present in `patch` onto these settings.
    pub fn merged(&self, patch: &Value) -> Result<Self, String> {
        let Some(fields) = patch.as_object() else {
            return Err("settings must be a JSON object".into());
        };
        let mut current = serde_json::to_value(self).map_err(|e| e.to_string())?;
        if let Some(obj) = current.as_object_mut() {
            for (k, v) in fields {
                obj.insert(k.clone(), v.clone());
            }
        }
        let next: Self = serde_json::from_value(current).map_err(|e| e.to_string())?;
        next.validate()?;
        Ok(next)
    }
}

pub async fn get(pool: &PgPool, user_id: &str) -> Result<UserSettings> {
    let stored: Option<Json<UserSettings>> =
        sqlx::query_scalar("SELECT settings FROM user_settings WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(stored.map(|j| j.0).unwrap_or_default())
}

pub async fn put(pool: &PgPool, user_id: &str, settings: &UserSettings) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_settings (user_id, settings) VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET settings = EXCLUDED.settings, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(Json(settings))
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_take_defaults() {
        let s: UserSettings = serde_json::from_value(json!({"briefingHour": 9})).unwrap();
        assert_eq!(s.briefing_hour, 9);
        assert!(s.briefings_enabled);
        assert_eq!(s.timezone, "UTC");
    }

    #[test]
    fn test_merge_overlays_only_given_keys() {
        let base = UserSettings::default();
        let next = base.merged(&json!({"timezone": "Europe/Berlin"})).unwrap();
        assert_eq!(next.timezone, "Europe/Berlin");
        assert_eq!(next.briefing_hour, base.briefing_hour);
    }

    #[test]
    fn test_merge_rejects_invalid_values() {
        let base = UserSettings::default();
        assert!(base.merged(&json!({"briefingHour": 30})).is_err());
        assert!(base.merged(&json!({"briefingHour": "seven"})).is_err());
        assert!(base.merged(&json!({"defaultVisibility": "public"})).is_err());
        assert!(base.merged(&json!([1, 2])).is_err());
    }
}
