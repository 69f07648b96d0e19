//! Streams one audio asset into an answered call.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::answer::settle;
use crate::audio::AudioSource;
use crate::channel::{wait_for_tokens, CommandChannel};
use crate::codec::VoiceFormat;
use crate::config::Timings;
use crate::error::Result;
use crate::framing::{AudioFrame, FrameAssembler, TRANSMIT_TERMINATOR};
use crate::pacer::Pacer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub format: VoiceFormat,
    pub frames: usize,
    pub bytes: usize,
    pub passthrough: bool,
    pub interrupted: bool,
}

pub struct Player<'a> {
    format: VoiceFormat,
    timings: &'a Timings,
}

impl<'a> Player<'a> {
    pub fn new(format: VoiceFormat, timings: &'a Timings) -> Self {
        Self { format, timings }
    }

    /// Enter voice-transmit mode, stream `source`, terminate and hang up.
    ///
    /// Once transmit mode is entered the DLE ETX terminator and `ATH` are
    /// always sent, even when streaming stopped on an error. `stop` is
    /// checked between frames.
    pub fn play<C>(&self, channel: &mut C, mut source: AudioSource, stop: &AtomicBool) -> Result<PlaybackReport>
    where
        C: CommandChannel + ?Sized,
    {
        source.set_target_rate(self.format.rate);
        let passthrough = source.is_passthrough();

        channel.send_command("AT+VTX")?;
        if wait_for_tokens(channel, &["CONNECT"], self.timings.vtx_timeout)?.is_none() {
            warn!("No CONNECT after AT+VTX within {:?}, transmitting anyway", self.timings.vtx_timeout);
        }

        info!("Playing {} audio as {}", if passthrough { "raw" } else { "decoded" }, self.format);
        let mut pacer = Pacer::new(self.format.rate);
        let streamed = self.stream(channel, &mut pacer, source, stop);

        channel.send(&TRANSMIT_TERMINATOR)?;
        settle(self.timings.terminate_settle);
        channel.send_command("ATH")?;

        let interrupted = streamed?;
        info!(
            "Playback finished: {} frames, {} bytes{}",
            pacer.frames_sent(),
            pacer.bytes_sent(),
            if interrupted { " (interrupted)" } else { "" }
        );

        Ok(PlaybackReport {
            format: self.format,
            frames: pacer.frames_sent(),
            bytes: pacer.bytes_sent(),
            passthrough,
            interrupted,
        })
    }

    /// Lead-in silence, then the asset; returns whether `stop` cut it short.
    fn stream<C>(&self, channel: &mut C, pacer: &mut Pacer, source: AudioSource, stop: &AtomicBool) -> Result<bool>
    where
        C: CommandChannel + ?Sized,
    {
        let mut assembler = FrameAssembler::for_rate(self.format.rate);

        let lead_in = (self.format.rate as u128 * self.timings.lead_in_silence.as_millis() / 1000) as usize;
        // A lead-in that isn't a whole number of frames runs into the first audio frame
        let frames = assembler.push(&self.format.silence(lead_in));
        if send_all(channel, pacer, &frames, stop)? {
            return Ok(true);
        }

        for chunk in source.encoded(self.format) {
            let frames = assembler.push(&chunk?);
            if send_all(channel, pacer, &frames, stop)? {
                return Ok(true);
            }
        }

        if let Some(partial) = assembler.finish() {
            if stop.load(Ordering::Relaxed) {
                return Ok(true);
            }
            pacer.send(channel, &partial)?;
        }
        Ok(false)
    }
}

/// Returns true if `stop` was raised before all frames went out.
fn send_all<C>(channel: &mut C, pacer: &mut Pacer, frames: &[AudioFrame], stop: &AtomicBool) -> Result<bool>
where
    C: CommandChannel + ?Sized,
{
    for frame in frames {
        if stop.load(Ordering::Relaxed) {
            return Ok(true);
        }
        pacer.send(channel, frame)?;
    }
    Ok(false)
}
