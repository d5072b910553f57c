use super::client::{OpenApi, OpenApiError};
use crate::db::installations::Installation;
use reqwest::{Method, StatusCode};
use serde::Deserialize;

/// The response of the issue details endpoint, reduced to what is needed to
/// find the issue's project.
///
/// Depending on the deployment, the project is either a top-level field or
/// nested under `data`.
#[derive(Debug, Default, Deserialize)]
pub struct IssueDetailsResponse {
    pub project: Option<ProjectSummary>,
    pub data: Option<IssueDetailsData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IssueDetailsData {
    pub project: Option<ProjectSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectSummary {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl ProjectSummary {
    /// The project id, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

impl IssueDetailsResponse {
    /// The project owning the issue.
    ///
    /// A non-null top-level `project` always wins, even when it lacks an id;
    /// `data.project` is only consulted when the top-level field is absent.
    pub fn project(&self) -> Option<&ProjectSummary> {
        self.project
            .as_ref()
            .or_else(|| self.data.as_ref()?.project.as_ref())
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project()?.id()
    }
}

fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Percent-encodes one path segment. Form encoding writes a space as `+`,
/// which a path would read as a literal plus; a literal plus is already
/// escaped as `%2B`.
fn encode_segment(value: &str) -> String {
    encode_query(value).replace('+', "%20")
}

/// Fetches the details of `issue_id`, acting as `acting_user_id`.
pub async fn get_issue_details(
    api: &dyn OpenApi,
    installation: &Installation,
    acting_user_id: &str,
    issue_id: &str,
    team_id: &str,
) -> Result<IssueDetailsResponse, OpenApiError> {
    let path = format!(
        "/openapi/v2/project/issues/{}?teamID={}",
        encode_segment(issue_id),
        encode_query(team_id)
    );
    let details = api
        .call(installation, acting_user_id, &path, Method::GET, None)
        .await?;
    if details.is_null() {
        return Ok(IssueDetailsResponse::default());
    }
    serde_json::from_value(details).map_err(OpenApiError::Decode)
}

/// Adds `watchers` to the watchers of `issue_id`.
///
/// Adding users who already watch the issue is not an error: a `409 Conflict`
/// answer is treated as success, so the call can be repeated safely.
pub async fn add_issue_watchers(
    api: &dyn OpenApi,
    installation: &Installation,
    issue_id: &str,
    team_id: &str,
    watchers: &[String],
) -> Result<(), OpenApiError> {
    let path = format!(
        "/openapi/v2/project/issues/{}/watchers?teamID={}",
        encode_segment(issue_id),
        encode_query(team_id)
    );
    let body = serde_json::json!({ "watchers": watchers });
    match api
        .call(installation, "", &path, Method::POST, Some(&body))
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.status() == Some(StatusCode::CONFLICT) => {
            tracing::debug!("watchers already present on issue {issue_id}: {e}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Lists the teams the installation has access to.
pub async fn list_teams(
    api: &dyn OpenApi,
    installation: &Installation,
) -> Result<serde_json::Value, OpenApiError> {
    api.call(
        installation,
        "",
        "/openapi/v2/account/teams",
        Method::GET,
        None,
    )
    .await
}
