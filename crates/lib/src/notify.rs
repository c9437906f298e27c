//! Chat-bot notifier: re-post the event with the created card's code and share link.

use crate::event::InboundEvent;
use crate::tracker::CreatedCard;

/// Notifier posting rewritten events to a chat-bot incoming webhook.
#[derive(Clone)]
pub struct ChatNotifier {
    webhook_url: String,
    share_base: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("chat webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("chat webhook rejected notification")]
    Rejected,
}

/// Share link for a created card, derived from the tracker base domain.
pub fn share_url(base: &str, card_id: &str) -> String {
    format!("{}/#/?viewId=whole&vuId={}", base.trim_end_matches('/'), card_id)
}

/// Copy of the event with the card code prefixed onto the title and the url
/// replaced by the share link. Every other field passes through verbatim.
pub fn notification_body(
    card: &CreatedCard,
    event: &InboundEvent,
    share_base: &str,
) -> InboundEvent {
    let mut out = event.clone();
    let title = out.event.title.take().unwrap_or_default();
    out.event.title = Some(format!("#{} {}", card.code, title));
    out.url = Some(share_url(share_base, &card.id));
    out
}

impl ChatNotifier {
    pub fn new(webhook_url: impl Into<String>, share_base: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            share_base: share_base.into(),
            client: reqwest::Client::new(),
        }
    }

    /// POST the rewritten event to the chat webhook. Non-2xx is an error; no retry.
    pub async fn notify(
        &self,
        card: &CreatedCard,
        event: &InboundEvent,
    ) -> Result<(), NotifyError> {
        let body = notification_body(card, event, &self.share_base);
        let res = self
            .client
            .post(&self.webhook_url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(NotifyError::Rejected);
        }
        Ok(())
    }
}
