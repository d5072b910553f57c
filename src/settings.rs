//! Endpoints backing the settings page: read and save the watcher rule.

use crate::auth::AppUser;
use crate::db::watcher_rules::{WatcherRule, WatcherRuleInput};
use crate::errors::{AppError, UserError};
use crate::handlers::Context;
use axum::{Json, extract::State};
use chrono::SecondsFormat;
use serde::Serialize;
use std::sync::Arc;

/// The watcher rule as shown by the settings page.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherRuleDto {
    pub id: String,
    pub project_id: String,
    pub team_id: String,
    pub watcher_user_ids: Vec<String>,
    pub active: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WatcherRule> for WatcherRuleDto {
    fn from(rule: WatcherRule) -> Self {
        WatcherRuleDto {
            id: rule.id.to_string(),
            project_id: rule.project_id,
            team_id: rule.team_id,
            watcher_user_ids: rule.watcher_user_ids,
            active: rule.active,
            created_by: rule.created_by,
            created_at: rule.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: rule.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// `GET /settings/watcher-rule`
///
/// Without an active rule, every field is empty and `active` is false.
pub async fn get_watcher_rule(
    State(ctx): State<Arc<Context>>,
    _user: AppUser,
) -> Result<Json<WatcherRuleDto>, AppError> {
    let rule = ctx.rules.get_active_rule().await?;
    Ok(Json(rule.map(WatcherRuleDto::from).unwrap_or_default()))
}

/// `PUT /settings/watcher-rule`
pub async fn save_watcher_rule(
    State(ctx): State<Arc<Context>>,
    AppUser(claims): AppUser,
    Json(input): Json<WatcherRuleInput>,
) -> Result<Json<WatcherRuleDto>, AppError> {
    if input.project_id.trim().is_empty() {
        return Err(UserError("projectId must not be empty".to_string()).into());
    }
    if input.team_id.trim().is_empty() {
        return Err(UserError("teamId must not be empty".to_string()).into());
    }

    let created_by = Some(claims.sub.as_str()).filter(|sub| !sub.is_empty());
    let saved = ctx.rules.save_rule(&input, created_by).await?;
    tracing::info!(
        "watcher rule saved by {}: project={} team={} watchers={}",
        claims.sub,
        saved.project_id,
        saved.team_id,
        saved.watcher_user_ids.len()
    );
    Ok(Json(saved.into()))
}
