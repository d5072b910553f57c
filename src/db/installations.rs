use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// A tenant registration, carrying what is needed to call the ONES OpenAPI
/// on that tenant's behalf.
#[derive(Debug, Clone)]
pub struct Installation {
    pub installation_id: String,
    pub organization_id: String,
    /// Base URL of the tenant's ONES deployment, such as `https://ones.example.com`.
    pub ones_base_url: String,
    pub access_token: SecretString,
    pub installed_at: DateTime<Utc>,
}
