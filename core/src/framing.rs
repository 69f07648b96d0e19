use crate::error::{ModemError, Result};
use crate::{frame_len, DLE, ETX};

/// Encoded audio for one frame period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub bytes: Vec<u8>,
    /// Uncompressed samples the bytes stand for
    pub samples: usize,
}

impl AudioFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        // Every supported line codec is one byte per sample
        let samples = bytes.len();
        Self { bytes, samples }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Double every DLE so payload bytes can't be read as a command
pub fn escape_dle(payload: &[u8]) -> Vec<u8> {
    let extra = payload.iter().filter(|&&b| b == DLE).count();
    let mut escaped = Vec::with_capacity(payload.len() + extra);
    for &byte in payload {
        escaped.push(byte);
        if byte == DLE {
            escaped.push(DLE);
        }
    }
    escaped
}

/// Inverse of [`escape_dle`]; a DLE not followed by another DLE is rejected
pub fn unescape_dle(data: &[u8]) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(data.len());
    let mut iter = data.iter().enumerate();
    while let Some((i, &byte)) = iter.next() {
        if byte == DLE {
            match iter.next() {
                Some((_, &DLE)) => {}
                _ => return Err(ModemError::InvalidEscape(i)),
            }
        }
        payload.push(byte);
    }
    Ok(payload)
}

/// End-of-transmit marker, never escaped
pub const TRANSMIT_TERMINATOR: [u8; 2] = [DLE, ETX];

/// Regroups encoded bytes into whole frames
///
/// Bytes that don't fill a frame are held until the next push.
pub struct FrameAssembler {
    frame_len: usize,
    pending: Vec<u8>,
}

impl FrameAssembler {
    pub fn new(frame_len: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len * 2),
        }
    }

    /// 20 ms frames at `rate`
    pub fn for_rate(rate: u32) -> Self {
        Self::new(frame_len(rate))
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Add encoded bytes and take every complete frame now available
    pub fn push(&mut self, bytes: &[u8]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(bytes);

        let whole = self.pending.len() / self.frame_len * self.frame_len;
        let frames = self
            .pending
            .drain(..whole)
            .collect::<Vec<u8>>()
            .chunks(self.frame_len)
            .map(|chunk| AudioFrame::new(chunk.to_vec()))
            .collect();
        frames
    }

    /// Whatever is left once the stream ends, unpadded
    pub fn finish(self) -> Option<AudioFrame> {
        if self.pending.is_empty() {
            None
        } else {
            Some(AudioFrame::new(self.pending))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_doubles_dle_only() {
        assert_eq!(escape_dle(&[0x01, DLE, ETX, DLE]), vec![0x01, DLE, DLE, ETX, DLE, DLE]);
        assert_eq!(escape_dle(&[0xFF, 0x80]), vec![0xFF, 0x80]);
    }

    #[test]
    fn test_escaped_payload_never_contains_terminator() {
        let payload = [DLE, ETX, 0x00, DLE, DLE, ETX];
        let escaped = escape_dle(&payload);
        // every DLE in the escaped stream is paired, so DLE ETX cannot appear unescaped
        let mut i = 0;
        while i < escaped.len() {
            if escaped[i] == DLE {
                assert_eq!(escaped[i + 1], DLE);
                i += 2;
            } else {
                i += 1;
            }
        }
    }

    #[test]
    fn test_unescape_rejects_lone_dle() {
        match unescape_dle(&[0x01, DLE, ETX]) {
            Err(ModemError::InvalidEscape(1)) => {} // Expected
            other => panic!("Expected InvalidEscape, got {:?}", other),
        }
        assert!(unescape_dle(&[DLE]).is_err());
    }

    #[test]
    fn test_assembler_carries_remainder() {
        let mut assembler = FrameAssembler::for_rate(8000);
        assert_eq!(assembler.frame_len(), 160);

        assert!(assembler.push(&[0u8; 100]).is_empty());
        let frames = assembler.push(&[1u8; 300]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.bytes.len() == 160 && f.samples == 160));
        assert_eq!(&frames[0].bytes[..100], &[0u8; 100][..]);
        assert_eq!(frames[0].bytes[100], 1);

        let rest = assembler.finish().unwrap();
        assert_eq!(rest.bytes.len(), 80);
    }

    #[test]
    fn test_assembler_exact_fit_leaves_nothing() {
        let mut assembler = FrameAssembler::for_rate(8000);
        assert_eq!(assembler.push(&[0u8; 320]).len(), 2);
        assert!(assembler.finish().is_none());
    }

    #[test]
    fn test_frame_len_other_rates() {
        assert_eq!(FrameAssembler::for_rate(11025).frame_len(), 220);
        assert_eq!(FrameAssembler::for_rate(7200).frame_len(), 144);
    }

    proptest! {
        #[test]
        fn prop_unescape_inverts_escape(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(unescape_dle(&escape_dle(&payload)).unwrap(), payload);
        }

        #[test]
        fn prop_dle_heavy_payloads(payload in proptest::collection::vec(prop_oneof![Just(DLE), Just(ETX), any::<u8>()], 0..128)) {
            let escaped = escape_dle(&payload);
            let dles = payload.iter().filter(|&&b| b == DLE).count();
            prop_assert_eq!(escaped.len(), payload.len() + dles);
            prop_assert_eq!(unescape_dle(&escaped).unwrap(), payload);
        }
    }
}
