//! Line codecs for voice-transmit mode.
//!
//! μ-law and A-law follow ITU-T G.711 (the STL reference bit layout);
//! 8-bit PCM keeps the high byte of each sample.

use std::fmt;
use std::str::FromStr;

use crate::error::ModemError;
use crate::DEFAULT_SAMPLE_RATE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Ulaw,
    Alaw,
    Pcm8,
}

impl Codec {
    /// Negotiation preference, best first
    pub const PREFERENCE: [Codec; 3] = [Codec::Ulaw, Codec::Alaw, Codec::Pcm8];
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Codec::Ulaw => "ulaw",
            Codec::Alaw => "alaw",
            Codec::Pcm8 => "pcm8",
        })
    }
}

impl FromStr for Codec {
    type Err = ModemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ulaw" | "mulaw" | "u-law" | "pcmu" => Ok(Codec::Ulaw),
            "alaw" | "a-law" | "pcma" => Ok(Codec::Alaw),
            "pcm8" | "pcm" | "linear8" => Ok(Codec::Pcm8),
            other => Err(ModemError::InvalidConfig(format!("unknown codec '{}'", other))),
        }
    }
}

/// Line format for one playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceFormat {
    pub codec: Codec,
    pub rate: u32,
    /// Only meaningful for 8-bit PCM
    pub signed: bool,
}

impl Default for VoiceFormat {
    fn default() -> Self {
        Self {
            codec: Codec::Pcm8,
            rate: DEFAULT_SAMPLE_RATE,
            signed: false,
        }
    }
}

impl fmt::Display for VoiceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.codec {
            Codec::Pcm8 if self.signed => write!(f, "pcm8 (signed) @ {} Hz", self.rate),
            Codec::Pcm8 => write!(f, "pcm8 (unsigned) @ {} Hz", self.rate),
            codec => write!(f, "{} @ {} Hz", codec, self.rate),
        }
    }
}

impl VoiceFormat {
    /// Encoded value of digital silence
    pub fn silence_byte(&self) -> u8 {
        match self.codec {
            Codec::Ulaw => 0xFF,
            Codec::Alaw => 0xD5,
            Codec::Pcm8 if self.signed => 0x00,
            Codec::Pcm8 => 0x80,
        }
    }

    pub fn encode_sample(&self, sample: i16) -> u8 {
        match self.codec {
            Codec::Ulaw => ulaw_compress(sample),
            Codec::Alaw => alaw_compress(sample),
            Codec::Pcm8 => pcm8_encode(sample, self.signed),
        }
    }

    /// Encode a block of linear samples, one byte per sample.
    pub fn encode(&self, samples: &[i16]) -> Vec<u8> {
        samples.iter().map(|&s| self.encode_sample(s)).collect()
    }

    /// `samples` worth of silence in this format.
    pub fn silence(&self, samples: usize) -> Vec<u8> {
        vec![self.silence_byte(); samples]
    }
}

/// A-law compression: 13 MSBs in, even bits toggled on the way out.
pub fn alaw_compress(sample: i16) -> u8 {
    let mut ix = if sample < 0 {
        (((!sample) as u16) >> 4) as i16
    } else {
        sample >> 4
    };

    if ix > 15 {
        let mut iexp = 1;
        while ix > 16 + 15 {
            ix >>= 1;
            iexp += 1;
        }
        ix -= 16;
        ix += iexp << 4;
    }

    if sample >= 0 {
        ix |= 0x0080;
    }

    (ix ^ 0x0055) as u8
}

pub fn alaw_expand(compressed: u8) -> i16 {
    let ix = ((compressed ^ 0x55) & 0x7F) as i16;
    let iexp = ix >> 4;
    let mut mant = ix & 0x0F;

    if iexp > 0 {
        mant += 16;
    }
    mant = (mant << 4) + 0x08;
    if iexp > 1 {
        mant <<= iexp - 1;
    }

    if compressed > 127 {
        mant
    } else {
        -mant
    }
}

/// μ-law compression: 14 MSBs in, bias 33, inverted on the way out.
pub fn ulaw_compress(sample: i16) -> u8 {
    let absno = if sample < 0 {
        (((!sample) as u16) >> 2) as i16 + 33
    } else {
        (sample >> 2) + 33
    };
    let absno = absno.min(0x1FFF);

    let mut i = absno >> 6;
    let mut segno = 1;
    while i != 0 {
        segno += 1;
        i >>= 1;
    }

    let high_nibble = 0x0008 - segno;
    let low_nibble = 0x000F - ((absno >> segno) & 0x000F);
    let mut result = (high_nibble << 4) | low_nibble;

    if sample >= 0 {
        result |= 0x0080;
    }

    result as u8
}

pub fn ulaw_expand(compressed: u8) -> i16 {
    let sign = if compressed < 0x80 { -1 } else { 1 };
    let mantissa = (!compressed) as i16;
    let exponent = (mantissa >> 4) & 0x07;
    let segment = exponent + 1;
    let mantissa = mantissa & 0x0F;
    let step = 4 << segment;

    sign * ((0x80 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

/// Truncate to the high byte; unsigned output is re-biased around 0x80.
pub fn pcm8_encode(sample: i16, signed: bool) -> u8 {
    let high = (sample >> 8) as i8;
    if signed {
        high as u8
    } else {
        (high as u8) ^ 0x80
    }
}

pub fn pcm8_decode(byte: u8, signed: bool) -> i16 {
    let value = if signed { byte as i8 } else { (byte ^ 0x80) as i8 };
    (value as i16) << 8
}
