//! Source audio decoding for playback.
//!
//! WAV assets are pulled lazily, one block of source frames at a time, and
//! turned into mono 16-bit samples at the line rate. Anything that is not a
//! readable WAV file is streamed byte for byte as already-encoded audio.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec};
use log::{debug, warn};

use crate::codec::VoiceFormat;
use crate::config::AudioOptions;
use crate::error::{ModemError, Result};
use crate::resample::{downmix, Resampler};
use crate::{GAIN_MAX, GAIN_MIN, RAW_CHUNK_BYTES, SILENCE_RMS_FLOOR, SOURCE_BLOCK_FRAMES};

pub enum AudioSource {
    Wav(WavBlocks<BufReader<File>>),
    Raw(RawChunks<BufReader<File>>),
}

impl AudioSource {
    /// Open `path`, falling back to raw passthrough if it isn't a WAV file.
    pub fn open(path: &Path, target_rate: u32, options: &AudioOptions) -> Result<Self> {
        let file = File::open(path)?;
        match WavReader::new(BufReader::new(file)) {
            Ok(reader) => Ok(Self::Wav(WavBlocks::new(reader, target_rate, options.clone())?)),
            Err(err) => {
                warn!(
                    "{} is not a decodable WAV file ({}), streaming it as raw line audio",
                    path.display(),
                    err
                );
                let file = File::open(path)?;
                Ok(Self::Raw(RawChunks::new(BufReader::new(file))))
            }
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Change the output rate of a decoded source before its first block.
    pub fn set_target_rate(&mut self, rate: u32) {
        if let Self::Wav(blocks) = self {
            blocks.set_target_rate(rate);
        }
    }

    /// Line-encoded chunks in `format`; raw sources pass through untouched.
    pub fn encoded(self, format: VoiceFormat) -> EncodedStream {
        EncodedStream { source: self, format }
    }
}

pub struct EncodedStream {
    source: AudioSource,
    format: VoiceFormat,
}

impl Iterator for EncodedStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            AudioSource::Wav(blocks) => {
                let format = self.format;
                blocks.next().map(|block| block.map(|samples| format.encode(&samples)))
            }
            AudioSource::Raw(chunks) => chunks.next(),
        }
    }
}

/// Lazily decoded WAV audio as mono 16-bit blocks at the line rate
pub struct WavBlocks<R: Read> {
    reader: WavReader<R>,
    spec: WavSpec,
    resampler: Resampler,
    options: AudioOptions,
    finished: bool,
}

impl<R: Read> WavBlocks<R> {
    pub fn new(reader: WavReader<R>, target_rate: u32, options: AudioOptions) -> Result<Self> {
        let spec = reader.spec();
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8 | 16 | 24 | 32) | (SampleFormat::Float, 32) => {}
            (format, bits) => {
                return Err(ModemError::Audio(format!("unsupported sample format {:?}/{} bits", format, bits)));
            }
        }
        if spec.channels == 0 {
            return Err(ModemError::Audio("WAV file declares zero channels".to_string()));
        }
        if spec.sample_rate == 0 {
            return Err(ModemError::Audio("WAV file declares a zero sample rate".to_string()));
        }

        debug!(
            "Source audio: {} Hz, {} channel(s), {} bits -> mono {} Hz",
            spec.sample_rate, spec.channels, spec.bits_per_sample, target_rate
        );

        Ok(Self {
            reader,
            spec,
            resampler: Resampler::new(spec.sample_rate, target_rate),
            options,
            finished: false,
        })
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Restarts rate conversion toward `rate`; blocks already read are not redone.
    pub fn set_target_rate(&mut self, rate: u32) {
        self.resampler = Resampler::new(self.spec.sample_rate, rate);
    }

    /// Next block of interleaved source samples widened to 16-bit scale.
    fn read_block(&mut self) -> Result<Vec<f32>> {
        let wanted = SOURCE_BLOCK_FRAMES * self.spec.channels as usize;
        let mut block = Vec::with_capacity(wanted);

        match self.spec.sample_format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    block.push((sample? * 32767.0).clamp(-32768.0, 32767.0));
                }
            }
            SampleFormat::Int => {
                let bits = self.spec.bits_per_sample;
                let signed_8bit = self.options.source_signed_8bit;
                for sample in self.reader.samples::<i32>().take(wanted) {
                    block.push(widen(sample?, bits, signed_8bit) as f32);
                }
            }
        }
        Ok(block)
    }

    fn transform(&mut self, block: &[f32]) -> Vec<i16> {
        let mono = downmix(block, self.spec.channels as usize);
        let mut samples = self.resampler.process(&mono);

        if self.options.remove_dc {
            remove_dc(&mut samples);
        }
        if self.options.normalize {
            normalize_rms(&mut samples, self.options.target_rms * 32767.0);
        }

        samples
            .into_iter()
            .map(|s| s.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect()
    }
}

impl<R: Read> Iterator for WavBlocks<R> {
    type Item = Result<Vec<i16>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let block = match self.read_block() {
                Ok(block) => block,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };
            if block.is_empty() {
                self.finished = true;
                break;
            }

            let samples = self.transform(&block);
            if !samples.is_empty() {
                return Some(Ok(samples));
            }
        }
        None
    }
}

/// Fixed-size chunks of an already-encoded byte stream
pub struct RawChunks<R: Read> {
    reader: R,
    finished: bool,
}

impl<R: Read> RawChunks<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, finished: false }
    }
}

impl<R: Read> Iterator for RawChunks<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut chunk = Vec::with_capacity(RAW_CHUNK_BYTES);
        match (&mut self.reader).take(RAW_CHUNK_BYTES as u64).read_to_end(&mut chunk) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(_) => Some(Ok(chunk)),
            Err(err) => {
                self.finished = true;
                Some(Err(err.into()))
            }
        }
    }
}

/// Scale an integer sample of `bits` depth to 16-bit.
///
/// hound hands out 8-bit WAV samples already re-biased to signed; when the
/// source bytes were signed to begin with that bias is undone first.
pub fn widen(sample: i32, bits: u16, signed_8bit: bool) -> i16 {
    match bits {
        8 => {
            let value = if signed_8bit {
                ((sample + 128) as u8) as i8
            } else {
                sample as i8
            };
            (value as i16) << 8
        }
        16 => sample as i16,
        bits if bits > 16 => (sample >> (bits - 16)) as i16,
        bits => (sample << (16 - bits)) as i16,
    }
}

/// Subtract the block mean.
pub fn remove_dc(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    for sample in samples.iter_mut() {
        *sample -= mean;
    }
}

/// Scale the block toward `target` RMS (16-bit units), gain clamped to
/// [`GAIN_MIN`, `GAIN_MAX`]. Near-silent blocks are left alone.
///
/// Returns the gain applied.
pub fn normalize_rms(samples: &mut [f32], target: f32) -> f32 {
    let rms = rms(samples);
    if rms < SILENCE_RMS_FLOOR {
        return 1.0;
    }

    let gain = (target / rms).clamp(GAIN_MIN, GAIN_MAX);
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
    gain
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (energy / samples.len() as f64).sqrt() as f32
}
