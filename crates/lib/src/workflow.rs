//! Background workflow for one inbound event: session, card, notification.
//!
//! Runs after the webhook response has already been sent, so no failure here
//! surfaces to the original caller. Each stage swallows its own failure at the
//! local boundary and records the outcome in the returned report.

use crate::collector::Collector;
use crate::event::InboundEvent;
use crate::notify::ChatNotifier;
use crate::tracker::{CreatedCard, TrackerClient};
use serde_json::json;

/// Per-stage outcomes of one workflow run.
#[derive(Debug)]
pub struct WorkflowReport {
    pub run_id: String,
    pub session: SessionOutcome,
    pub card: CardOutcome,
    pub notify: NotifyOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Login returned a session cookie.
    Obtained,
    /// Login failed or returned no cookie; the run continued unauthenticated.
    Empty,
}

#[derive(Debug, PartialEq)]
pub enum CardOutcome {
    Created(CreatedCard),
    Failed(String),
}

#[derive(Debug, PartialEq)]
pub enum NotifyOutcome {
    Sent,
    Failed(String),
    /// Card creation failed, so no notification was attempted.
    Skipped,
}

/// Run the full workflow for one event. Plain async fn — the caller decides
/// how (and whether) to detach it; tests call it directly.
pub async fn run_workflow(
    collector: &Collector,
    tracker: &TrackerClient,
    notifier: &ChatNotifier,
    event: InboundEvent,
) -> WorkflowReport {
    let run_id = uuid::Uuid::new_v4().to_string();
    let short = &run_id[..8];
    log::debug!("workflow {}: starting", short);
    let _ = collector.post("worker work flow start").await;

    let cookie = tracker.session(collector).await;
    let session = if cookie.is_empty() {
        log::debug!("workflow {}: no session cookie, continuing unauthenticated", short);
        SessionOutcome::Empty
    } else {
        SessionOutcome::Obtained
    };

    match tracker.create_card(&event, &cookie, collector).await {
        Ok(card) => {
            let detail = json!({ "message": "card detail", "cardInfo": &card });
            let detail_body = detail.to_string();
            // Settle both: the detail post and the notification run concurrently
            // and neither outcome affects the other.
            let (detail_res, notify_res) = tokio::join!(
                collector.post(&detail_body),
                notifier.notify(&card, &event)
            );
            let _ = detail_res;
            let notify = match notify_res {
                Ok(()) => NotifyOutcome::Sent,
                Err(e) => {
                    log::warn!("workflow {}: notification failed: {}", short, e);
                    let _ = collector.post(&format!("send to chat error: {}", e)).await;
                    NotifyOutcome::Failed(e.to_string())
                }
            };
            WorkflowReport {
                run_id,
                session,
                card: CardOutcome::Created(card),
                notify,
            }
        }
        Err(e) => {
            log::warn!("workflow {}: card creation failed: {}", short, e);
            let _ = collector.post(&format!("create card error: {}", e)).await;
            WorkflowReport {
                run_id,
                session,
                card: CardOutcome::Failed(e.to_string()),
                notify: NotifyOutcome::Skipped,
            }
        }
    }
}
