//! Service configuration, read from flags or the environment.

use secrecy::SecretString;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "auto-watcher", about = "Adds configured watchers to newly created ONES issues")]
pub struct Config {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Postgres URL, or path of the SQLite database file.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// SQLite database file, used when no `DATABASE_URL` is given.
    #[arg(long, env = "DB_FILE", default_value = "./app.db")]
    pub db_file: String,

    /// Public URL of this service, advertised in the manifest.
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "MANIFEST_PATH", default_value = "manifest.json")]
    pub manifest_path: PathBuf,

    /// Secret used to verify the tokens sent by the settings page.
    #[arg(long, env = "APP_SECRET", value_parser = parse_secret, hide_env_values = true)]
    pub app_secret: SecretString,

    #[arg(long, env = "OPENAPI_TIMEOUT_SECS", default_value_t = 15)]
    pub openapi_timeout_secs: u64,

    #[arg(long, env = "MAX_CONCURRENT_REQUESTS", default_value_t = 64)]
    pub max_concurrent_requests: usize,
}

fn parse_secret(s: &str) -> Result<SecretString, std::convert::Infallible> {
    Ok(SecretString::from(s))
}

impl Config {
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(&self.db_file)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn openapi_timeout(&self) -> Duration {
        Duration::from_secs(self.openapi_timeout_secs)
    }
}
