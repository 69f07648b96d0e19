//! Off-hook in voice mode: auto-answer first, explicit line seize second.
//!
//! Modems differ in whether they acknowledge a voice answer, so a missing
//! acknowledgement after `ATA` falls through to `AT+VLS=1` before the call
//! is given up.

use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::channel::{wait_for_tokens, CommandChannel};
use crate::config::Timings;
use crate::error::{ModemError, Result};

/// Lines that confirm the line is up in voice mode
pub const CONNECT_TOKENS: [&str; 2] = ["VCON", "CONNECT"];
/// Lines that mean the caller is already gone
pub const HANGUP_TOKENS: [&str; 2] = ["NO CARRIER", "BUSY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPath {
    AutoAnswer,
    LineSeize,
}

pub struct AnswerSequencer<'a> {
    timings: &'a Timings,
}

impl<'a> AnswerSequencer<'a> {
    pub fn new(timings: &'a Timings) -> Self {
        Self { timings }
    }

    /// Take the ringing line off-hook in voice mode.
    ///
    /// On failure the modem has been sent `ATH` already.
    pub fn answer<C>(&self, channel: &mut C) -> Result<AnswerPath>
    where
        C: CommandChannel + ?Sized,
    {
        self.command(channel, "ATM0")?;
        self.command(channel, "AT+FCLASS=8")?;

        info!("Answering with ATA");
        channel.send_command("ATA")?;
        if self.acknowledged(channel, self.timings.answer_timeout)? {
            return Ok(AnswerPath::AutoAnswer);
        }

        warn!("No answer acknowledgement after {:?}, seizing line with AT+VLS=1", self.timings.answer_timeout);
        channel.send_command("AT+VLS=1")?;
        if self.acknowledged(channel, self.timings.seize_timeout)? {
            return Ok(AnswerPath::LineSeize);
        }

        channel.send_command("ATH")?;
        Err(ModemError::AnswerFailed)
    }

    fn command<C>(&self, channel: &mut C, command: &str) -> Result<()>
    where
        C: CommandChannel + ?Sized,
    {
        channel.send_command(command)?;
        settle(self.timings.command_settle);
        Ok(())
    }

    fn acknowledged<C>(&self, channel: &mut C, timeout: Duration) -> Result<bool>
    where
        C: CommandChannel + ?Sized,
    {
        let accepted: Vec<&str> = CONNECT_TOKENS.iter().chain(HANGUP_TOKENS.iter()).copied().collect();
        let Some(response) = wait_for_tokens(channel, &accepted, timeout)? else {
            return Ok(false);
        };

        if HANGUP_TOKENS.iter().any(|token| response.contains(token)) {
            channel.send_command("ATH")?;
            return Err(ModemError::CallDropped(response.text));
        }
        info!("Line connected ({}) after {:?}", response.text, response.elapsed);
        Ok(true)
    }
}

pub(crate) fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
