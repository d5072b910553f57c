use serde::{Deserialize, Deserializer, Serialize};

/// The `eventType` of an issue creation notification.
pub const ISSUE_CREATED_EVENT: &str = "ones:project:issue:created";

/// An event notification delivered to `/event_cb`.
///
/// Every field is optional on the wire, and `null` reads as absent, so that
/// malformed events reach the rule engine and get classified there instead of
/// being rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IssueCreatedEvent {
    #[serde(rename = "eventID", default, deserialize_with = "null_as_default")]
    pub event_id: String,
    #[serde(rename = "eventType", default, deserialize_with = "null_as_default")]
    pub event_type: String,
    /// Unix timestamp of the event, as sent by the platform.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
    /// The installation the event is delivered for.
    #[serde(rename = "subscriberID", default, deserialize_with = "null_as_default")]
    pub subscriber_id: String,
    #[serde(rename = "eventData", default, deserialize_with = "null_as_default")]
    pub event_data: IssueCreatedEventData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IssueCreatedEventData {
    #[serde(rename = "issueID", default, deserialize_with = "null_as_default")]
    pub issue_id: String,
    #[serde(rename = "teamID", skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(rename = "triggerUserID", skip_serializing_if = "Option::is_none")]
    pub trigger_user_id: Option<String>,
    #[serde(rename = "organizationID", skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(rename = "scopeID", skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    #[serde(rename = "statusID", skip_serializing_if = "Option::is_none")]
    pub status_id: Option<String>,
}

/// Reads an explicit `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl IssueCreatedEvent {
    pub fn is_issue_created(&self) -> bool {
        self.event_type == ISSUE_CREATED_EVENT
    }
}
