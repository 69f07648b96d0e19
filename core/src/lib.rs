//! Call screening for analog voice modems
//!
//! Watches the modem's status lines for caller ID and rings, answers in voice
//! mode after a ring threshold and streams a recorded clip into the call
//! (G.711 or 8-bit PCM, DLE framed, paced at 20 ms per frame).

pub mod error;
pub mod channel;
pub mod status;
pub mod call;
pub mod config;
pub mod hooks;
pub mod answer;
pub mod vsm;
pub mod codec;
pub mod resample;
pub mod audio;
pub mod framing;
pub mod pacer;
pub mod playback;
pub mod handler;

pub use call::{CallAction, CallSession, CallState, CallTracker};
pub use channel::{CommandChannel, ModemResponse, ScriptedChannel};
pub use codec::{Codec, VoiceFormat};
pub use config::{AnswerMode, AudioOptions, CallSettings, Timings};
pub use error::{ModemError, Result};
pub use handler::{CallHandler, Hooks};
pub use hooks::{CallEvent, CallLog, CallOutcome, Notifier, NumberNormalizer};
pub use playback::PlaybackReport;
pub use status::LineStatusEvent;

// Voice-transmit framing
pub const FRAME_DURATION_MS: u64 = 20;
pub const DLE: u8 = 0x10;
pub const ETX: u8 = 0x03;

// Source decoding
pub const SOURCE_BLOCK_FRAMES: usize = 1024;
pub const RAW_CHUNK_BYTES: usize = 1024;

// Loudness normalization gain bounds
pub const GAIN_MIN: f32 = 0.3;
pub const GAIN_MAX: f32 = 3.0;

// Blocks quieter than this RMS (16-bit units) are left alone
pub const SILENCE_RMS_FLOOR: f32 = 16.0;

pub const DEFAULT_SAMPLE_RATE: u32 = 8000;
pub const DEFAULT_RING_THRESHOLD: u32 = 3;

/// Bytes in one 20 ms frame at `rate` (one byte per sample for every line codec)
pub const fn frame_len(rate: u32) -> usize {
    (rate as usize * FRAME_DURATION_MS as usize) / 1000
}
