//! The always-on call loop.
//!
//! One flow drives the modem: a status line is fully handled (including any
//! answer and playback it triggers) before the next one is read. Failures
//! inside a call are logged and end that call only; a read failure in the
//! idle loop ends the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::answer::{settle, AnswerSequencer};
use crate::audio::AudioSource;
use crate::call::{CallAction, CallSession, CallTracker};
use crate::channel::CommandChannel;
use crate::config::{AnswerMode, CallSettings};
use crate::error::Result;
use crate::hooks::{CallEvent, CallLog, CallOutcome, Notifier, NumberNormalizer};
use crate::playback::{PlaybackReport, Player};
use crate::status::LineStatusEvent;
use crate::vsm;

/// Modem setup, in order: factory defaults, no echo, voice class, no
/// auto-answer, caller ID on, extended result codes, verbose results
pub const INIT_COMMANDS: [&str; 7] = ["AT&F", "ATE0", "AT+FCLASS=8", "ATS0=0", "AT+VCID=1", "ATX4", "ATV1"];

/// The collaborators a handler reports to
pub struct Hooks {
    pub log: Box<dyn CallLog>,
    pub notifier: Box<dyn Notifier>,
    pub normalizer: Box<dyn NumberNormalizer>,
}

pub struct CallHandler<'a, C: CommandChannel> {
    channel: C,
    settings: &'a CallSettings,
    tracker: CallTracker,
    hooks: Hooks,
    stop: Arc<AtomicBool>,
}

impl<'a, C: CommandChannel> CallHandler<'a, C> {
    pub fn new(channel: C, settings: &'a CallSettings, hooks: Hooks) -> Self {
        Self {
            channel,
            settings,
            tracker: CallTracker::new(settings.ring_threshold),
            hooks,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned stop flag (e.g. set from a signal handler).
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn tracker(&self) -> &CallTracker {
        &self.tracker
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Put the modem in caller-ID listening mode.
    pub fn initialize(&mut self) -> Result<()> {
        for command in INIT_COMMANDS {
            self.channel.send_command(command)?;
            settle(self.settings.timings.init_step_delay);
        }
        Ok(())
    }

    /// Serve calls until the stop flag is raised or the channel fails.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Line {} ready, answering after {} ring(s)",
            self.settings.local_number, self.settings.ring_threshold
        );

        while !self.stop.load(Ordering::Relaxed) {
            if let Some(raw) = self.channel.read_line(self.settings.timings.poll_interval)? {
                self.process_line(&raw);
            }
        }

        info!("Stop requested, leaving call loop");
        Ok(())
    }

    /// Handle one raw status line; returns the outcome if it ended a call.
    pub fn process_line(&mut self, raw: &[u8]) -> Option<CallOutcome> {
        let event = match LineStatusEvent::classify(raw) {
            LineStatusEvent::CallerId(number) => {
                let normalized = self.hooks.normalizer.normalize(&number);
                info!("Incoming call from {}", normalized);
                LineStatusEvent::CallerId(normalized)
            }
            LineStatusEvent::Unrecognized(text) if text.is_empty() => return None,
            event => event,
        };
        debug!("Status: {:?}", event);

        let is_ring = event == LineStatusEvent::Ring;
        let action = self.tracker.advance(event);
        if is_ring && action.is_none() {
            let session = self.tracker.session();
            info!("Ring {} from {}", session.rings, caller_label(session));
        }

        match action? {
            CallAction::Decide(session) => Some(self.decide(session)),
            CallAction::Busy(session) => {
                info!("Call from {} ended before answer", caller_label(&session));
                self.report(&session, CallOutcome::Busy);
                Some(CallOutcome::Busy)
            }
        }
    }

    /// Ring threshold reached. The tracker is already idle; whatever happens
    /// here the next status line starts from a clean slate.
    fn decide(&mut self, session: CallSession) -> CallOutcome {
        let outcome = match self.settings.mode {
            AnswerMode::Playback => CallOutcome::AnsweredWithAudio,
            AnswerMode::HangupOnly => CallOutcome::HangupAfterWebhook,
        };
        info!("Ring threshold reached for {}: {}", caller_label(&session), outcome);
        self.report(&session, outcome);

        let result = match self.settings.mode {
            AnswerMode::Playback => self.answer_and_play().map(|report| {
                debug!("Playback report: {:?}", report);
            }),
            AnswerMode::HangupOnly => self.drop_call(),
        };

        if let Err(err) = result {
            error!("Call from {} abandoned: {}", caller_label(&session), err);
            self.release_line();
        }
        outcome
    }

    fn answer_and_play(&mut self) -> Result<PlaybackReport> {
        let settings = self.settings;
        let path = AnswerSequencer::new(&settings.timings).answer(&mut self.channel)?;
        debug!("Answered via {:?}", path);

        let source = AudioSource::open(&settings.audio_file, settings.voice.rate, &settings.audio)?;
        // Raw clips are already encoded; only the configured format can carry them
        let negotiate = settings.negotiate && !source.is_passthrough();
        if settings.negotiate && !negotiate {
            warn!(
                "{} is raw line audio, requesting {} instead of negotiating",
                settings.audio_file.display(),
                settings.voice
            );
        }

        let selection = vsm::negotiate(&mut self.channel, settings.voice, negotiate, &settings.timings)?;
        Player::new(selection.format, &settings.timings).play(&mut self.channel, source, &self.stop)
    }

    /// Pick up and put down again, which drops the caller.
    fn drop_call(&mut self) -> Result<()> {
        self.channel.send_command("ATH1")?;
        settle(self.settings.timings.command_settle);
        self.channel.send_command("ATH")
    }

    fn release_line(&mut self) {
        if let Err(err) = self.channel.send_command("ATH") {
            warn!("Could not hang up after failed call: {}", err);
        }
    }

    fn report(&mut self, session: &CallSession, outcome: CallOutcome) {
        let local_number = &self.settings.local_number;
        let event = CallEvent::now(session.caller.clone(), local_number, outcome);

        if let Err(err) = self.hooks.log.record(&event) {
            warn!("Failed to record call: {}", err);
        }
        if let Err(err) = self.hooks.notifier.notify(session.caller.as_deref(), local_number, outcome) {
            warn!("Failed to send notification: {}", err);
        }
    }
}

fn caller_label(session: &CallSession) -> &str {
    session.caller.as_deref().unwrap_or("unknown caller")
}
