/// Classification of a single status line emitted by the modem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStatusEvent {
    /// Caller ID delivery (`NMBR = 099837840`), number as sent by the exchange
    CallerId(String),
    Ring,
    Busy,
    NoCarrier,
    Ok,
    Unrecognized(String),
}

const CALLER_ID_PREFIX: &str = "NMBR";
const RING_TOKEN: &str = "RING";
const BUSY_TOKEN: &str = "BUSY";
const NO_CARRIER_TOKEN: &str = "NO CARRIER";

/// Keep printable ASCII only and trim surrounding whitespace.
pub fn sanitize(raw: &[u8]) -> String {
    let text: String = raw
        .iter()
        .filter(|&&b| (0x20..=0x7E).contains(&b))
        .map(|&b| b as char)
        .collect();
    text.trim().to_string()
}

impl LineStatusEvent {
    pub fn classify(raw: &[u8]) -> Self {
        Self::classify_text(&sanitize(raw))
    }

    /// Classify an already sanitized line.
    pub fn classify_text(line: &str) -> Self {
        if line == "OK" {
            return Self::Ok;
        }

        if line.starts_with(CALLER_ID_PREFIX) && line.contains('=') {
            let number = line.rsplit('=').next().unwrap_or_default().trim();
            return Self::CallerId(number.to_string());
        }

        if line.contains(RING_TOKEN) || line == "R" {
            Self::Ring
        } else if line.contains(BUSY_TOKEN) {
            Self::Busy
        } else if line.contains(NO_CARRIER_TOKEN) {
            Self::NoCarrier
        } else {
            Self::Unrecognized(line.to_string())
        }
    }

    /// True for the two call-end indications.
    pub fn is_call_end(&self) -> bool {
        matches!(self, Self::Busy | Self::NoCarrier)
    }
}
