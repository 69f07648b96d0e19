use std::path::PathBuf;
use std::time::Duration;

use crate::codec::VoiceFormat;
use crate::error::{ModemError, Result};
use crate::DEFAULT_RING_THRESHOLD;

/// What to do once the ring threshold is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Answer in voice mode and play the configured clip
    Playback,
    /// Pick up and drop the line without playing anything
    HangupOnly,
}

/// Source-audio transforms applied before encoding
#[derive(Debug, Clone, PartialEq)]
pub struct AudioOptions {
    pub remove_dc: bool,
    pub normalize: bool,
    /// RMS target as a fraction of 16-bit full scale
    pub target_rms: f32,
    /// 8-bit source samples are already signed (no re-bias on widening)
    pub source_signed_8bit: bool,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            remove_dc: true,
            normalize: true,
            target_rms: 0.1,
            source_signed_8bit: false,
        }
    }
}

/// Timeouts and settle delays for the modem dialogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    pub answer_timeout: Duration,
    pub seize_timeout: Duration,
    pub command_settle: Duration,
    pub init_step_delay: Duration,
    pub vsm_timeout: Duration,
    pub vtx_timeout: Duration,
    pub lead_in_silence: Duration,
    pub terminate_settle: Duration,
    /// Read timeout of the idle loop; bounds how long a stop request waits
    pub poll_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            answer_timeout: Duration::from_secs(8),
            seize_timeout: Duration::from_secs(5),
            command_settle: Duration::from_millis(500),
            init_step_delay: Duration::from_millis(200),
            vsm_timeout: Duration::from_secs(2),
            vtx_timeout: Duration::from_secs(2),
            lead_in_silence: Duration::from_millis(100),
            terminate_settle: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Everything the call loop needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub local_number: String,
    pub ring_threshold: u32,
    pub mode: AnswerMode,
    pub audio_file: PathBuf,
    /// Requested line format, kept unless the modem says otherwise
    pub voice: VoiceFormat,
    pub negotiate: bool,
    pub audio: AudioOptions,
    pub timings: Timings,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            local_number: String::new(),
            ring_threshold: DEFAULT_RING_THRESHOLD,
            mode: AnswerMode::Playback,
            audio_file: PathBuf::from("voices/busy_lines.wav"),
            voice: VoiceFormat::default(),
            negotiate: true,
            audio: AudioOptions::default(),
            timings: Timings::default(),
        }
    }
}

impl CallSettings {
    pub fn validate(&self) -> Result<()> {
        if self.ring_threshold == 0 {
            return Err(ModemError::InvalidConfig("ring threshold must be at least 1".to_string()));
        }
        if self.voice.rate == 0 {
            return Err(ModemError::InvalidConfig("sample rate must be positive".to_string()));
        }
        if !(self.audio.target_rms > 0.0 && self.audio.target_rms <= 1.0) {
            return Err(ModemError::InvalidConfig(format!(
                "target RMS {} must be in (0, 1]",
                self.audio.target_rms
            )));
        }
        Ok(())
    }
}
