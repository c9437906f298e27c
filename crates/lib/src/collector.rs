//! Remote log collector: best-effort raw-text POST of diagnostic lines.

use chrono::{SecondsFormat, Utc};

/// Fire-and-forget diagnostic sink. A failed post is returned to the caller;
/// call sites in the workflow discard it so the sink never alters control flow.
#[derive(Clone)]
pub struct Collector {
    url: String,
    client: reqwest::Client,
}

impl Collector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// POST one message as a raw text body, prefixed with a UTC timestamp.
    pub async fn post(&self, message: &str) -> Result<(), reqwest::Error> {
        let line = format!(
            "{} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            message
        );
        self.client.post(&self.url).body(line).send().await?;
        Ok(())
    }
}
