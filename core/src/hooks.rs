//! Side-effecting collaborators the call loop reports to.
//!
//! None of these may interrupt call handling: failures come back as errors
//! that the handler logs and drops.

use std::fmt;

use chrono::{DateTime, Local};

pub type HookError = Box<dyn std::error::Error + Send + Sync>;
pub type HookResult = std::result::Result<(), HookError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    AnsweredWithAudio,
    HangupAfterWebhook,
    Busy,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::AnsweredWithAudio => "answered_with_audio",
            CallOutcome::HangupAfterWebhook => "hangup_after_webhook",
            CallOutcome::Busy => "busy",
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallEvent {
    pub timestamp: DateTime<Local>,
    pub caller: Option<String>,
    pub local_number: String,
    pub outcome: CallOutcome,
}

impl CallEvent {
    pub fn now(caller: Option<String>, local_number: &str, outcome: CallOutcome) -> Self {
        Self {
            timestamp: Local::now(),
            caller,
            local_number: local_number.to_string(),
            outcome,
        }
    }
}

/// Persistent record of handled calls
pub trait CallLog: Send {
    fn record(&mut self, event: &CallEvent) -> HookResult;
}

/// Outbound notification about a handled call
pub trait Notifier: Send {
    fn notify(&self, caller: Option<&str>, local_number: &str, outcome: CallOutcome) -> HookResult;
}

/// Canonical form of a caller-ID number
pub trait NumberNormalizer: Send {
    fn normalize(&self, raw: &str) -> String;
}

impl<F> NumberNormalizer for F
where
    F: Fn(&str) -> String + Send,
{
    fn normalize(&self, raw: &str) -> String {
        self(raw)
    }
}

/// Log sink that drops everything
#[derive(Debug, Default)]
pub struct DiscardLog;

impl CallLog for DiscardLog {
    fn record(&mut self, _event: &CallEvent) -> HookResult {
        Ok(())
    }
}

/// Notifier used when no webhook is configured
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _caller: Option<&str>, _local_number: &str, _outcome: CallOutcome) -> HookResult {
        Ok(())
    }
}
