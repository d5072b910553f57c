use super::installations::Installation;
use super::watcher_rules::{WatcherRule, WatcherRuleInput};
use super::{InstallationStore, RuleStore};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use secrecy::ExposeSecret;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Migrations, applied in order. The index of the last applied migration is
/// kept in the `user_version` pragma, so the first entry is a no-op.
static MIGRATIONS: &[&str] = &[
    "",
    r#"
CREATE TABLE installations (
    installation_id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL DEFAULT '',
    ones_base_url TEXT NOT NULL,
    access_token TEXT NOT NULL,
    installed_at TEXT NOT NULL
);
    "#,
    r#"
CREATE TABLE watcher_rules (
    id BLOB PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    team_id TEXT NOT NULL,
    watcher_user_ids TEXT NOT NULL DEFAULT '[]',
    active BOOLEAN NOT NULL DEFAULT 1,
    created_by TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
    "#,
    r#"
CREATE UNIQUE INDEX watcher_rules_single_active ON watcher_rules (active) WHERE active;
    "#,
];

pub struct Sqlite {
    conn: Mutex<rusqlite::Connection>,
}

impl Sqlite {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating database directory {}", parent.display()))?;
            }
        }
        let conn = rusqlite::Connection::open(path)
            .with_context(|| format!("opening sqlite database {}", path.display()))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::init(conn)
    }

    /// A private database that lives as long as the returned value.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory()?)
    }

    fn init(mut conn: rusqlite::Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&mut conn)?;
        Ok(Sqlite {
            conn: Mutex::new(conn),
        })
    }

    fn raw(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn run_migrations(conn: &mut rusqlite::Connection) -> Result<()> {
    let version: i32 = conn
        .query_row(
            "select user_version from pragma_user_version;",
            params![],
            |row| row.get(0),
        )
        .context("reading the schema version")?;
    for (mid, sql) in MIGRATIONS.iter().enumerate().skip(version as usize + 1) {
        tracing::debug!("applying sqlite migration {mid}");
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("executing {mid}th migration"))?;
        tx.pragma_update(None, "user_version", mid as i32)?;
        tx.commit()?;
    }
    Ok(())
}

const RULE_COLUMNS: &str =
    "id, project_id, team_id, watcher_user_ids, active, created_by, created_at, updated_at";

#[async_trait::async_trait]
impl RuleStore for Sqlite {
    async fn get_active_rule(&self) -> Result<Option<WatcherRule>> {
        let rule = self
            .raw()
            .query_row(
                &format!("SELECT {RULE_COLUMNS} FROM watcher_rules WHERE active LIMIT 1"),
                params![],
                deserialize_rule,
            )
            .optional()
            .context("selecting the active watcher rule")?;
        Ok(rule)
    }

    async fn save_rule(
        &self,
        input: &WatcherRuleInput,
        created_by: Option<&str>,
    ) -> Result<WatcherRule> {
        let watchers = serde_json::to_string(&input.normalized_watchers())?;
        let now = Utc::now();
        // The partial unique index turns a second insert into an update of the
        // active row, leaving its id and provenance untouched.
        let rule = self
            .raw()
            .query_row(
                &format!(
                    "INSERT INTO watcher_rules
                        (id, project_id, team_id, watcher_user_ids, active, created_by, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)
                    ON CONFLICT (active) WHERE active DO UPDATE SET
                        project_id = excluded.project_id,
                        team_id = excluded.team_id,
                        watcher_user_ids = excluded.watcher_user_ids,
                        updated_at = excluded.updated_at
                    RETURNING {RULE_COLUMNS}"
                ),
                params![
                    Uuid::new_v4(),
                    input.project_id,
                    input.team_id,
                    watchers,
                    created_by.unwrap_or_default(),
                    now,
                ],
                deserialize_rule,
            )
            .context("saving the watcher rule")?;
        Ok(rule)
    }
}

#[async_trait::async_trait]
impl InstallationStore for Sqlite {
    async fn get_installation(&self, installation_id: &str) -> Result<Option<Installation>> {
        let installation = self
            .raw()
            .query_row(
                "SELECT installation_id, organization_id, ones_base_url, access_token, installed_at
                FROM installations WHERE installation_id = ?",
                [installation_id],
                |row| {
                    Ok(Installation {
                        installation_id: row.get(0)?,
                        organization_id: row.get(1)?,
                        ones_base_url: row.get(2)?,
                        access_token: row.get::<_, String>(3)?.into(),
                        installed_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("selecting installation")?;
        Ok(installation)
    }

    async fn save_installation(&self, installation: &Installation) -> Result<()> {
        self.raw()
            .execute(
                "INSERT INTO installations
                    (installation_id, organization_id, ones_base_url, access_token, installed_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (installation_id) DO UPDATE SET
                    organization_id = excluded.organization_id,
                    ones_base_url = excluded.ones_base_url,
                    access_token = excluded.access_token,
                    installed_at = excluded.installed_at",
                params![
                    installation.installation_id,
                    installation.organization_id,
                    installation.ones_base_url,
                    installation.access_token.expose_secret(),
                    installation.installed_at,
                ],
            )
            .context("saving installation")?;
        Ok(())
    }
}

fn deserialize_rule(row: &rusqlite::Row<'_>) -> std::result::Result<WatcherRule, rusqlite::Error> {
    let watchers: String = row.get(3)?;
    let watcher_user_ids = serde_json::from_str(&watchers).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(WatcherRule {
        id: row.get(0)?,
        project_id: row.get(1)?,
        team_id: row.get(2)?,
        watcher_user_ids,
        active: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
