//! App lifecycle endpoints called by the ONES platform: manifest, install and
//! enable callbacks, and the setting page entries.

use crate::db::installations::Installation;
use crate::errors::{AppError, UserError};
use crate::handlers::Context;
use crate::ones::list_teams;
use anyhow::Context as _;
use axum::{
    Json,
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// `GET /`
///
/// Serves the manifest file, with `base_url` set to the configured base URL.
pub async fn manifest(State(ctx): State<Arc<Context>>) -> Result<Response, AppError> {
    let path = &ctx.config.manifest_path;
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest file {}", path.display()))?;
    let mut manifest: serde_json::Map<String, Value> =
        serde_json::from_str(&contents).context("failed to parse manifest file")?;

    if !manifest
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty())
    {
        return Err(anyhow::anyhow!("manifest is missing required field: id").into());
    }
    match &ctx.config.base_url {
        Some(base_url) => {
            manifest.insert("base_url".to_string(), Value::String(base_url.clone()));
        }
        None => {
            manifest.remove("base_url");
        }
    }

    let body = serde_json::to_string_pretty(&manifest)?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

#[derive(Debug, Deserialize)]
pub struct InstallCallback {
    pub installation_id: String,
    #[serde(default)]
    pub organization_id: String,
    pub ones_base_url: String,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct InstallCallbackResponse {
    pub installation_id: String,
    pub time_stamp: i64,
}

/// `POST /install_cb`
pub async fn install_callback(
    State(ctx): State<Arc<Context>>,
    Json(callback): Json<InstallCallback>,
) -> Result<Json<InstallCallbackResponse>, AppError> {
    tracing::info!(
        "receive install callback installation id: {}",
        callback.installation_id
    );
    if callback.installation_id.is_empty() {
        return Err(UserError("installation_id must not be empty".to_string()).into());
    }

    let installation = Installation {
        installation_id: callback.installation_id,
        organization_id: callback.organization_id,
        ones_base_url: callback.ones_base_url,
        access_token: callback.access_token.into(),
        installed_at: Utc::now(),
    };
    ctx.installations
        .save_installation(&installation)
        .await
        .context("save install callback info failed")?;
    tracing::info!(
        "save install callback info success: {}",
        installation.installation_id
    );

    Ok(Json(InstallCallbackResponse {
        installation_id: installation.installation_id,
        time_stamp: Utc::now().timestamp(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LifecycleCallback {
    pub installation_id: String,
}

/// `POST /enabled_cb`
///
/// Checks that the stored credentials work by listing the teams.
pub async fn enabled_callback(
    State(ctx): State<Arc<Context>>,
    Json(callback): Json<LifecycleCallback>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        "receive enabled callback installation id: {}",
        callback.installation_id
    );
    let installation = ctx
        .installations
        .get_installation(&callback.installation_id)
        .await?
        .with_context(|| format!("installation {} not found", callback.installation_id))?;

    let teams = list_teams(ctx.ones.as_ref(), &installation)
        .await
        .context("enabled callback failed")?;
    tracing::info!("organization enabled, teams: {teams}");

    Ok(Json(serde_json::json!({"status": "success", "message": "ok"})))
}

#[derive(Debug, Serialize)]
pub struct SettingPageEntry {
    pub title: &'static str,
    pub page_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SettingPageEntries {
    pub entries: Vec<SettingPageEntry>,
}

/// `POST /settingPage/entries`
pub async fn setting_page_entries(Json(request): Json<Value>) -> Json<SettingPageEntries> {
    tracing::info!("handle user custom entries, info: {request}");
    Json(SettingPageEntries {
        entries: vec![SettingPageEntry {
            title: "Rule settings",
            page_url: "/static/settings-page.html",
        }],
    })
}
