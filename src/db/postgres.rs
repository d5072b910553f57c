use super::installations::Installation;
use super::watcher_rules::{WatcherRule, WatcherRuleInput};
use super::{InstallationStore, RuleStore};
use anyhow::Context as _;
use anyhow::Result;
use chrono::Utc;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use tokio_postgres::types::Json;
use uuid::Uuid;

pub struct Postgres {
    client: tokio_postgres::Client,
}

impl Postgres {
    pub async fn open(db_url: &str) -> Result<Self> {
        let client = make_client(db_url).await?;
        run_migrations(&client).await?;
        Ok(Postgres { client })
    }
}

pub async fn make_client(db_url: &str) -> Result<tokio_postgres::Client> {
    if db_url.contains("sslmode=require") {
        let connector = TlsConnector::builder()
            .build()
            .context("built TlsConnector")?;
        let connector = MakeTlsConnector::new(connector);

        let (db_client, connection) = match tokio_postgres::connect(db_url, connector).await {
            Ok(v) => v,
            Err(e) => {
                anyhow::bail!("failed to connect to DB: {}", e);
            }
        };
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {}", e);
            }
        });

        Ok(db_client)
    } else {
        tracing::warn!("Non-TLS connection to the database");
        let (db_client, connection) =
            match tokio_postgres::connect(db_url, tokio_postgres::NoTls).await {
                Ok(v) => v,
                Err(e) => {
                    anyhow::bail!("failed to connect to DB: {}", e);
                }
            };
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {}", e);
            }
        });

        Ok(db_client)
    }
}

static MIGRATIONS: &[&str] = &[
    "
CREATE TABLE installations (
    installation_id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL DEFAULT '',
    ones_base_url TEXT NOT NULL,
    access_token TEXT NOT NULL,
    installed_at TIMESTAMP WITH TIME ZONE NOT NULL
);
",
    "
CREATE TABLE watcher_rules (
    id UUID PRIMARY KEY,
    project_id TEXT NOT NULL,
    team_id TEXT NOT NULL,
    watcher_user_ids JSONB NOT NULL DEFAULT '[]',
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_by TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMP WITH TIME ZONE NOT NULL,
    updated_at TIMESTAMP WITH TIME ZONE NOT NULL
);
",
    "CREATE UNIQUE INDEX watcher_rules_single_active ON watcher_rules (active) WHERE active;",
];

pub async fn run_migrations(client: &tokio_postgres::Client) -> Result<()> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS database_versions (
                zero INTEGER PRIMARY KEY,
                migration_counter INTEGER
            );",
            &[],
        )
        .await
        .context("creating database versioning table")?;

    client
        .execute(
            "INSERT INTO database_versions (zero, migration_counter)
                VALUES (0, 0)
                ON CONFLICT DO NOTHING",
            &[],
        )
        .await
        .context("inserting initial database_versions")?;

    let migration_idx: i32 = client
        .query_one("SELECT migration_counter FROM database_versions", &[])
        .await
        .context("getting migration counter")?
        .get(0);
    let migration_idx = migration_idx as usize;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        if idx >= migration_idx {
            client
                .execute(*migration, &[])
                .await
                .with_context(|| format!("executing {}th migration", idx))?;
            client
                .execute(
                    "UPDATE database_versions SET migration_counter = $1",
                    &[&(idx as i32 + 1)],
                )
                .await
                .with_context(|| format!("updating migration counter to {}", idx))?;
        }
    }

    Ok(())
}

const RULE_COLUMNS: &str =
    "id, project_id, team_id, watcher_user_ids, active, created_by, created_at, updated_at";

#[async_trait::async_trait]
impl RuleStore for Postgres {
    async fn get_active_rule(&self) -> Result<Option<WatcherRule>> {
        let row = self
            .client
            .query_opt(
                &format!("SELECT {RULE_COLUMNS} FROM watcher_rules WHERE active LIMIT 1"),
                &[],
            )
            .await
            .context("selecting the active watcher rule")?;
        Ok(row.map(|r| r.into()))
    }

    async fn save_rule(
        &self,
        input: &WatcherRuleInput,
        created_by: Option<&str>,
    ) -> Result<WatcherRule> {
        let watchers = input.normalized_watchers();
        let now = Utc::now();
        let row = self
            .client
            .query_one(
                &format!(
                    "INSERT INTO watcher_rules
                        (id, project_id, team_id, watcher_user_ids, active, created_by, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, TRUE, $5, $6, $6)
                    ON CONFLICT (active) WHERE active DO UPDATE SET
                        project_id = EXCLUDED.project_id,
                        team_id = EXCLUDED.team_id,
                        watcher_user_ids = EXCLUDED.watcher_user_ids,
                        updated_at = EXCLUDED.updated_at
                    RETURNING {RULE_COLUMNS}"
                ),
                &[
                    &Uuid::new_v4(),
                    &input.project_id,
                    &input.team_id,
                    &Json(&watchers),
                    &created_by.unwrap_or_default(),
                    &now,
                ],
            )
            .await
            .context("saving the watcher rule")?;
        Ok(row.into())
    }
}

#[async_trait::async_trait]
impl InstallationStore for Postgres {
    async fn get_installation(&self, installation_id: &str) -> Result<Option<Installation>> {
        let row = self
            .client
            .query_opt(
                "SELECT installation_id, organization_id, ones_base_url, access_token, installed_at
                FROM installations WHERE installation_id = $1",
                &[&installation_id],
            )
            .await
            .context("selecting installation")?;
        Ok(row.map(|row| Installation {
            installation_id: row.get("installation_id"),
            organization_id: row.get("organization_id"),
            ones_base_url: row.get("ones_base_url"),
            access_token: row.get::<_, String>("access_token").into(),
            installed_at: row.get("installed_at"),
        }))
    }

    async fn save_installation(&self, installation: &Installation) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO installations
                    (installation_id, organization_id, ones_base_url, access_token, installed_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (installation_id) DO UPDATE SET
                    organization_id = EXCLUDED.organization_id,
                    ones_base_url = EXCLUDED.ones_base_url,
                    access_token = EXCLUDED.access_token,
                    installed_at = EXCLUDED.installed_at",
                &[
                    &installation.installation_id,
                    &installation.organization_id,
                    &installation.ones_base_url,
                    &installation.access_token.expose_secret(),
                    &installation.installed_at,
                ],
            )
            .await
            .context("saving installation")?;
        Ok(())
    }
}

impl From<tokio_postgres::row::Row> for WatcherRule {
    fn from(row: tokio_postgres::row::Row) -> Self {
        let Json(watcher_user_ids) = row.get::<_, Json<Vec<String>>>("watcher_user_ids");
        Self {
            id: row.get("id"),
            project_id: row.get("project_id"),
            team_id: row.get("team_id"),
            watcher_user_ids,
            active: row.get("active"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
