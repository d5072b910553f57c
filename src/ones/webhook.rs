use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::handlers::{Context, issue_watcher};

pub mod event;

use event::IssueCreatedEvent;

pub fn deserialize_payload<T: serde::de::DeserializeOwned>(v: &str) -> anyhow::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(v);
    let res: Result<T, _> = serde_path_to_error::deserialize(&mut deserializer);
    match res {
        Ok(r) => Ok(r),
        Err(e) => Err(anyhow::anyhow!("webhook payload: {v}").context(e)),
    }
}

/// Receives event notifications.
///
/// Once the payload parses, the answer is always 200 with the outcome as
/// body: the platform redelivers on any other status, and none of the
/// failures the rule engine reports would go away on redelivery.
pub async fn webhook(State(ctx): State<Arc<Context>>, payload: String) -> Response {
    let event = match deserialize_payload::<IssueCreatedEvent>(&payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!("failed to deserialize event: {err:?}");
            return (StatusCode::BAD_REQUEST, format!("invalid event payload: {err}"))
                .into_response();
        }
    };

    debug!("event={} type={}", event.event_id, event.event_type);

    let outcome = issue_watcher::handle_issue_created(&ctx, &event).await;
    Json(outcome).into_response()
}
