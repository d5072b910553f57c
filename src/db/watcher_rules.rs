use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The watcher-assignment policy currently in effect.
///
/// At most one rule is active at any time; saving a rule overwrites the
/// active one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatcherRule {
    pub id: Uuid,
    pub project_id: String,
    pub team_id: String,
    /// Users to add as watchers, in the order they were configured.
    pub watcher_user_ids: Vec<String>,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The editable part of a [`WatcherRule`], as sent by the settings page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherRuleInput {
    pub project_id: String,
    pub team_id: String,
    #[serde(default)]
    pub watcher_user_ids: Vec<String>,
}

impl WatcherRuleInput {
    /// Watcher ids with surrounding whitespace trimmed, empty ids dropped and
    /// duplicates removed. The first occurrence of an id keeps its position.
    pub fn normalized_watchers(&self) -> Vec<String> {
        let mut watchers: Vec<String> = Vec::with_capacity(self.watcher_user_ids.len());
        for id in &self.watcher_user_ids {
            let id = id.trim();
            if !id.is_empty() && !watchers.iter().any(|w| w == id) {
                watchers.push(id.to_string());
            }
        }
        watchers
    }
}
