use std::path::PathBuf;
use std::time::Duration;

use callscreen_core::{AnswerMode, AudioOptions, CallSettings, Codec, Timings, VoiceFormat};
use clap::{Parser, ValueEnum};

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Answer and play the audio file
    Playback,
    /// Drop the call without answering in voice mode
    HangupOnly,
}

impl From<Mode> for AnswerMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Playback => AnswerMode::Playback,
            Mode::HangupOnly => AnswerMode::HangupOnly,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "callscreen",
    about = "Screen incoming calls on a voice modem: log, notify, answer with a recording",
    version
)]
pub struct Cli {
    /// Serial device the modem is attached to
    #[arg(long, env = "PORT", default_value = "/dev/ttyACM0")]
    pub port: String,

    #[arg(long, env = "BAUD", default_value_t = 115200)]
    pub baud: u32,

    /// This line's own number, reported with every call
    #[arg(long, env = "NUMBER", default_value = "")]
    pub number: String,

    /// Endpoint receiving a JSON POST per call
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Rings before the call is handled
    #[arg(long, env = "MAX_RINGS", default_value_t = 3)]
    pub max_rings: u32,

    /// CSV file calls are appended to
    #[arg(long, env = "LOG_FILE", default_value = "calls_log.csv")]
    pub log_file: PathBuf,

    /// Recording played to answered calls (WAV, or raw bytes already in line format)
    #[arg(long, env = "AUDIO_FILE", default_value = "voices/busy_lines.wav")]
    pub audio_file: PathBuf,

    #[arg(long, env = "COUNTRY_CODE", default_value = "598")]
    pub country_code: String,

    #[arg(long, env = "TRUNK_PREFIX", default_value = "0")]
    pub trunk_prefix: String,

    #[arg(long, env = "ANSWER_MODE", value_enum, default_value_t = Mode::Playback)]
    pub mode: Mode,

    /// Line codec: ulaw, alaw or pcm8
    #[arg(long, env = "VOICE_CODEC", default_value = "pcm8")]
    pub codec: Codec,

    #[arg(long, env = "VOICE_RATE", default_value_t = 8000)]
    pub sample_rate: u32,

    /// Send 8-bit PCM signed instead of offset binary
    #[arg(long, env = "VOICE_SIGNED_PCM")]
    pub signed_pcm: bool,

    /// Keep the configured codec and rate instead of the modem's best offer
    #[arg(long)]
    pub no_negotiate: bool,

    #[arg(long, env = "VSM_NEGOTIATE", default_value_t = true, action = clap::ArgAction::Set, hide = true)]
    pub negotiate: bool,

    #[arg(long)]
    pub no_normalize: bool,

    /// Loudness target as a fraction of full scale
    #[arg(long, env = "TARGET_RMS", default_value_t = 0.1)]
    pub target_rms: f32,

    #[arg(long)]
    pub no_dc_removal: bool,

    /// 8-bit WAV sources hold signed samples
    #[arg(long)]
    pub source_signed_8bit: bool,

    #[arg(long, default_value_t = 8000)]
    pub answer_timeout_ms: u64,

    #[arg(long, default_value_t = 5000)]
    pub seize_timeout_ms: u64,

    /// Silence sent before the recording starts
    #[arg(long, default_value_t = 100)]
    pub lead_in_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn call_settings(&self) -> Result<CallSettings, CliError> {
        if self.baud == 0 {
            return Err(CliError::InvalidArgument("baud rate must be positive".to_string()));
        }

        let settings = CallSettings {
            local_number: self.number.clone(),
            ring_threshold: self.max_rings,
            mode: self.mode.into(),
            audio_file: self.audio_file.clone(),
            voice: VoiceFormat {
                codec: self.codec,
                rate: self.sample_rate,
                signed: self.signed_pcm,
            },
            negotiate: self.negotiate && !self.no_negotiate,
            audio: AudioOptions {
                remove_dc: !self.no_dc_removal,
                normalize: !self.no_normalize,
                target_rms: self.target_rms,
                source_signed_8bit: self.source_signed_8bit,
            },
            timings: Timings {
                answer_timeout: Duration::from_millis(self.answer_timeout_ms),
                seize_timeout: Duration::from_millis(self.seize_timeout_ms),
                lead_in_silence: Duration::from_millis(self.lead_in_ms),
                ..Timings::default()
            },
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["callscreen"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_map_onto_settings() {
        let cli = parse(&[
            "--number",
            "+59826001234",
            "--max-rings",
            "5",
            "--mode",
            "hangup-only",
            "--codec",
            "alaw",
            "--no-negotiate",
            "--no-normalize",
            "--lead-in-ms",
            "40",
        ]);
        let settings = cli.call_settings().unwrap();
        assert_eq!(settings.local_number, "+59826001234");
        assert_eq!(settings.ring_threshold, 5);
        assert_eq!(settings.mode, AnswerMode::HangupOnly);
        assert_eq!(settings.voice.codec, Codec::Alaw);
        assert!(!settings.negotiate);
        assert!(!settings.audio.normalize);
        assert!(settings.audio.remove_dc);
        assert_eq!(settings.timings.lead_in_silence, Duration::from_millis(40));
    }

    #[test]
    fn test_unknown_codec_rejected() {
        assert!(Cli::try_parse_from(["callscreen", "--codec", "gsm"]).is_err());
    }

    #[test]
    fn test_zero_rings_rejected() {
        let cli = parse(&["--max-rings", "0"]);
        assert!(matches!(cli.call_settings(), Err(CliError::Modem(_))));
    }
}
