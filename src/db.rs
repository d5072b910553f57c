//! Persistence for the watcher rule and the installations.
//!
//! Two backends are supported: SQLite (the default, a file path) and Postgres
//! (any URL starting with `postgres`). Both apply their migrations on open.

use self::installations::Installation;
use self::watcher_rules::{WatcherRule, WatcherRuleInput};
use anyhow::Result;
use std::path::Path;

pub mod installations;
pub mod postgres;
pub mod sqlite;
pub mod watcher_rules;

/// Storage of the single active watcher rule.
#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    /// Returns the active rule, or `Ok(None)` when no rule was ever saved.
    async fn get_active_rule(&self) -> Result<Option<WatcherRule>>;

    /// Creates the active rule, or overwrites the scope and watchers of the
    /// existing one.
    ///
    /// `created_by` is only recorded when the rule is first created.
    async fn save_rule(
        &self,
        input: &WatcherRuleInput,
        created_by: Option<&str>,
    ) -> Result<WatcherRule>;
}

/// Storage of the per-tenant installation records.
#[async_trait::async_trait]
pub trait InstallationStore: Send + Sync {
    /// Looks up an installation by its id, which is also the subscriber id of
    /// the events sent on its behalf.
    async fn get_installation(&self, installation_id: &str) -> Result<Option<Installation>>;
    async fn save_installation(&self, installation: &Installation) -> Result<()>;
}

pub enum Pool {
    Sqlite(sqlite::Sqlite),
    Postgres(postgres::Postgres),
}

impl Pool {
    pub async fn open(uri: &str) -> Result<Pool> {
        if uri.starts_with("postgres") {
            Ok(Pool::Postgres(postgres::Postgres::open(uri).await?))
        } else {
            let path = uri.strip_prefix("sqlite://").unwrap_or(uri);
            Ok(Pool::Sqlite(sqlite::Sqlite::open(Path::new(path))?))
        }
    }
}

#[async_trait::async_trait]
impl RuleStore for Pool {
    async fn get_active_rule(&self) -> Result<Option<WatcherRule>> {
        match self {
            Pool::Sqlite(db) => db.get_active_rule().await,
            Pool::Postgres(db) => db.get_active_rule().await,
        }
    }

    async fn save_rule(
        &self,
        input: &WatcherRuleInput,
        created_by: Option<&str>,
    ) -> Result<WatcherRule> {
        match self {
            Pool::Sqlite(db) => db.save_rule(input, created_by).await,
            Pool::Postgres(db) => db.save_rule(input, created_by).await,
        }
    }
}

#[async_trait::async_trait]
impl InstallationStore for Pool {
    async fn get_installation(&self, installation_id: &str) -> Result<Option<Installation>> {
        match self {
            Pool::Sqlite(db) => db.get_installation(installation_id).await,
            Pool::Postgres(db) => db.get_installation(installation_id).await,
        }
    }

    async fn save_installation(&self, installation: &Installation) -> Result<()> {
        match self {
            Pool::Sqlite(db) => db.save_installation(installation).await,
            Pool::Postgres(db) => db.save_installation(installation).await,
        }
    }
}
