//! Ordered command/response transport to the modem.
//!
//! Writes are FIFO relative to later reads, but there is no 1:1 mapping
//! between a command and the next line read: the modem interleaves
//! unsolicited status lines (RING, caller ID) with command responses.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::Result;
use crate::status::sanitize;

pub trait CommandChannel {
    /// Write raw bytes to the modem.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read one line (terminator stripped), or `None` if nothing arrived within `timeout`.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Send a textual AT command terminated with CR LF.
    fn send_command(&mut self, command: &str) -> Result<()> {
        debug!("-> {}", command);
        let mut line = Vec::with_capacity(command.len() + 2);
        line.extend_from_slice(command.as_bytes());
        line.extend_from_slice(b"\r\n");
        self.send(&line)
    }
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        (**self).read_line(timeout)
    }

    fn send_command(&mut self, command: &str) -> Result<()> {
        (**self).send_command(command)
    }
}

/// A decoded modem line and how long the wait for it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemResponse {
    pub text: String,
    pub elapsed: Duration,
}

impl ModemResponse {
    pub fn contains(&self, token: &str) -> bool {
        self.text.contains(token)
    }
}

/// Read lines until one satisfies `accept` or `timeout` runs out.
///
/// Lines that don't match are logged and dropped. Returns `Ok(None)` on
/// timeout; only channel I/O failures are errors.
pub fn wait_for_line<C, F>(channel: &mut C, timeout: Duration, mut accept: F) -> Result<Option<ModemResponse>>
where
    C: CommandChannel + ?Sized,
    F: FnMut(&str) -> bool,
{
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }

        let Some(raw) = channel.read_line(deadline - now)? else {
            continue;
        };

        let text = sanitize(&raw);
        if text.is_empty() {
            continue;
        }

        if accept(&text) {
            debug!("<- {} (accepted)", text);
            return Ok(Some(ModemResponse {
                text,
                elapsed: started.elapsed(),
            }));
        }
        debug!("<- {} (skipped)", text);
    }
}

/// Wait for a line containing any of `tokens`.
pub fn wait_for_tokens<C>(channel: &mut C, tokens: &[&str], timeout: Duration) -> Result<Option<ModemResponse>>
where
    C: CommandChannel + ?Sized,
{
    wait_for_line(channel, timeout, |line| tokens.iter().any(|token| line.contains(token)))
}

/// Discard lines already waiting, until the modem stays quiet for `window`.
///
/// Returns how many lines were dropped.
pub fn drain_lines<C>(channel: &mut C, window: Duration) -> Result<usize>
where
    C: CommandChannel + ?Sized,
{
    let mut dropped = 0;
    while let Some(raw) = channel.read_line(window)? {
        debug!("<- {} (stale)", sanitize(&raw));
        dropped += 1;
    }
    Ok(dropped)
}

/// In-memory channel for driving call flows without hardware.
///
/// Inbound lines are queued up front or produced by replies registered with
/// [`ScriptedChannel::reply_to`]; everything written is kept for inspection.
/// An empty queue reads as a timeout without sleeping.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    inbound: VecDeque<Vec<u8>>,
    replies: Vec<(String, Vec<String>)>,
    written: Vec<u8>,
    commands: Vec<String>,
    fail_reads: bool,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue lines the modem will "emit", in order.
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut channel = Self::new();
        for line in lines {
            channel.push_line(line.as_ref());
        }
        channel
    }

    pub fn push_line(&mut self, line: &str) {
        self.inbound.push_back(line.as_bytes().to_vec());
    }

    /// Queue `lines` whenever a command starting with `command` is sent.
    pub fn reply_to(&mut self, command: &str, lines: &[&str]) {
        self.replies.push((
            command.to_string(),
            lines.iter().map(|line| line.to_string()).collect(),
        ));
    }

    /// Make every subsequent read fail as if the port went away.
    pub fn fail_reads(&mut self) {
        self.fail_reads = true;
    }

    /// Every byte written, commands and audio alike.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// AT commands sent, without terminators, in order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn pending_lines(&self) -> usize {
        self.inbound.len()
    }
}

impl CommandChannel for ScriptedChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn send_command(&mut self, command: &str) -> Result<()> {
        debug!("-> {}", command);
        self.written.extend_from_slice(command.as_bytes());
        self.written.extend_from_slice(b"\r\n");

        let queued: Vec<String> = self
            .replies
            .iter()
            .filter(|(trigger, _)| command.starts_with(trigger.as_str()))
            .flat_map(|(_, lines)| lines.iter().cloned())
            .collect();
        for line in queued {
            self.inbound.push_back(line.into_bytes());
        }
        self.commands.push(command.to_string());
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        if self.fail_reads {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "scripted port closed").into());
        }
        Ok(self.inbound.pop_front())
    }
}
