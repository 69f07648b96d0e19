use std::time::Duration;

use callscreen_core::hooks::HookResult;
use callscreen_core::{CallOutcome, Notifier};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::info;

use crate::error::CliError;

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, PartialEq)]
pub struct WebhookPayload<'a> {
    #[serde(rename = "From")]
    pub from: &'a str,
    #[serde(rename = "To")]
    pub to: &'a str,
    #[serde(rename = "CallSid")]
    pub call_sid: &'a str,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(caller: Option<&'a str>, local_number: &'a str, outcome: CallOutcome) -> Self {
        Self {
            from: caller.unwrap_or(""),
            to: local_number,
            call_sid: outcome.as_str(),
        }
    }
}

/// POSTs each call outcome as JSON.
///
/// The call loop is synchronous, so requests are driven to completion on the
/// runtime behind `handle`; it must not be called from an async task.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    handle: Handle,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, handle: Handle) -> Result<Self, CliError> {
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            url: url.into(),
            client,
            handle,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, caller: Option<&str>, local_number: &str, outcome: CallOutcome) -> HookResult {
        let payload = WebhookPayload::new(caller, local_number, outcome);
        let response = self
            .handle
            .block_on(self.client.post(&self.url).json(&payload).send())?;

        let status = response.status();
        info!(event = %outcome, %status, "Webhook delivered");
        response.error_for_status()?;
        Ok(())
    }
}
