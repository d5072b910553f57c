//! Adds the watchers of the active rule to newly created issues.
//!
//! Each event goes through the same checks, in order, and stops at the first
//! one that does not pass:
//!
//! 1. the event is an issue creation,
//! 2. a watcher rule is active,
//! 3. the subscriber has an installation,
//! 4. a team id is known (the event's, else the rule's) and the event names an issue,
//! 5. the issue's project can be looked up,
//! 6. that project is the rule's project,
//! 7. the rule has watchers.
//!
//! Only then are the watchers added. Nothing is kept between events; a
//! redelivered event is processed again, which is harmless since adding
//! watchers is idempotent.

use super::Context;
use super::outcome::{FailedReason, IgnoredReason, Outcome};
use crate::ones::{IssueCreatedEvent, add_issue_watchers, get_issue_details};
use anyhow::Context as _;

/// Processes one event. Every failure is reported through the returned
/// [`Outcome`].
pub async fn handle_issue_created(ctx: &Context, event: &IssueCreatedEvent) -> Outcome {
    tracing::info!(
        "issue created event received: {} type={}",
        event.event_id,
        event.event_type
    );
    let outcome = match evaluate(ctx, event).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!("failed to process event {}: {err:?}", event.event_id);
            Outcome::Failed(FailedReason::UnknownError)
        }
    };
    tracing::debug!("event {} outcome: {outcome}", event.event_id);
    outcome
}

/// The team to scope upstream calls to. A non-empty team id carried by the
/// event wins over the rule's.
fn resolve_team_id<'a>(event_team_id: Option<&'a str>, rule_team_id: &'a str) -> &'a str {
    event_team_id
        .filter(|id| !id.is_empty())
        .unwrap_or(rule_team_id)
}

/// Errors are reserved for collaborators failing in ways no step anticipates.
async fn evaluate(ctx: &Context, event: &IssueCreatedEvent) -> anyhow::Result<Outcome> {
    if !event.is_issue_created() {
        tracing::warn!("unsupported event type: {}", event.event_type);
        return Ok(Outcome::Ignored(IgnoredReason::UnsupportedEvent));
    }

    let Some(rule) = ctx
        .rules
        .get_active_rule()
        .await
        .context("loading the active watcher rule")?
    else {
        tracing::info!("no active watcher rule; skipping event");
        return Ok(Outcome::Ignored(IgnoredReason::NoRule));
    };

    let Some(installation) = ctx
        .installations
        .get_installation(&event.subscriber_id)
        .await
        .with_context(|| format!("loading installation {}", event.subscriber_id))?
    else {
        tracing::error!(
            "installation not found for subscriber: {}",
            event.subscriber_id
        );
        return Ok(Outcome::Failed(FailedReason::MissingInstallation));
    };

    let data = &event.event_data;
    let team_id = resolve_team_id(data.team_id.as_deref(), &rule.team_id);
    if team_id.is_empty() {
        tracing::error!("missing team id for event {}", event.event_id);
        return Ok(Outcome::Failed(FailedReason::MissingTeam));
    }

    let issue_id = data.issue_id.as_str();
    if issue_id.is_empty() {
        tracing::warn!("missing issue id in event {}; skipping", event.event_id);
        return Ok(Outcome::Ignored(IgnoredReason::MissingIssue));
    }

    let acting_user_id = data.trigger_user_id.as_deref().unwrap_or_default();
    let details = match get_issue_details(
        ctx.ones.as_ref(),
        &installation,
        acting_user_id,
        issue_id,
        team_id,
    )
    .await
    {
        Ok(details) => details,
        Err(err) => {
            tracing::warn!("failed to lookup project for issue {issue_id}: {err}");
            return Ok(Outcome::Ignored(IgnoredReason::LookupFailed));
        }
    };

    let Some(project_id) = details.project_id() else {
        tracing::info!("project lookup returned no project for issue {issue_id}");
        return Ok(Outcome::Ignored(IgnoredReason::MissingProject));
    };
    match details.project().and_then(|p| p.name.as_deref()) {
        Some(name) => tracing::info!("resolved project for issue {issue_id}: {project_id} ({name})"),
        None => tracing::info!("resolved project for issue {issue_id}: {project_id}"),
    }

    if project_id != rule.project_id {
        tracing::info!("rule not applicable for project: {project_id}");
        return Ok(Outcome::Ignored(IgnoredReason::ProjectMismatch));
    }

    if rule.watcher_user_ids.is_empty() {
        tracing::info!("watcher rule has no users; skipping event");
        return Ok(Outcome::Ignored(IgnoredReason::EmptyWatchers));
    }

    match add_issue_watchers(
        ctx.ones.as_ref(),
        &installation,
        issue_id,
        team_id,
        &rule.watcher_user_ids,
    )
    .await
    {
        Ok(()) => {
            tracing::info!(
                "added watchers to issue {issue_id}: {}",
                rule.watcher_user_ids.join(", ")
            );
            Ok(Outcome::Processed)
        }
        Err(err) => {
            tracing::error!("failed to add watchers for issue {issue_id}: {err}");
            Ok(Outcome::Failed(FailedReason::OpenapiError))
        }
    }
}
