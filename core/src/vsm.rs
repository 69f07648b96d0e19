//! Voice stream mode (`AT+VSM`) capability query and format selection.
//!
//! Negotiation never fails a call: with no usable capability list the
//! requested format is used as configured.

use std::time::Duration;

use log::{debug, info, warn};

use crate::channel::{drain_lines, wait_for_line, wait_for_tokens, CommandChannel};
use crate::codec::{Codec, VoiceFormat};
use crate::error::Result;
use crate::config::Timings;
use crate::DEFAULT_SAMPLE_RATE;

/// Quiet period that ends the discard of leftover responses
const DRAIN_WINDOW: Duration = Duration::from_millis(50);

/// Largest code range (`a-b`) expanded from a capability list
const MAX_RANGE_SPAN: u32 = 256;

/// Known compression codes: V.253 (0, 1, 4, 5) and Conexant (128, 130, 131)
const VSM_CODES: &[(u16, Codec, bool)] = &[
    (0, Codec::Pcm8, true),
    (1, Codec::Pcm8, false),
    (4, Codec::Ulaw, false),
    (5, Codec::Alaw, false),
    (128, Codec::Pcm8, false),
    (130, Codec::Alaw, false),
    (131, Codec::Ulaw, false),
];

/// One codec the modem offers, with the code that selects it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsmCodec {
    pub code: u16,
    pub codec: Codec,
    pub signed: bool,
}

impl VsmCodec {
    pub fn from_code(code: u16) -> Option<Self> {
        VSM_CODES
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|&(code, codec, signed)| Self { code, codec, signed })
    }
}

/// Default code for a format when the modem didn't tell us its table
pub fn default_code(format: &VoiceFormat) -> u16 {
    match format.codec {
        Codec::Pcm8 if format.signed => 0,
        Codec::Pcm8 => 128,
        Codec::Alaw => 130,
        Codec::Ulaw => 131,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub codecs: Vec<VsmCodec>,
    /// Sample rates in the order listed
    pub rates: Vec<u32>,
}

impl Capabilities {
    /// Parse `+VSM: (codes),(rates),...`.
    ///
    /// Returns `None` when the first group is missing, malformed or holds no
    /// code we know, i.e. the response carries no usable information.
    pub fn parse(line: &str) -> Option<Self> {
        let groups = parenthesized_groups(line);
        let codes = parse_number_list(groups.first()?)?;

        let mut codecs: Vec<VsmCodec> = Vec::new();
        for code in codes {
            let Ok(code) = u16::try_from(code) else { continue };
            if let Some(entry) = VsmCodec::from_code(code) {
                if !codecs.contains(&entry) {
                    codecs.push(entry);
                }
            }
        }
        if codecs.is_empty() {
            return None;
        }

        let rates = groups
            .get(1)
            .and_then(|group| parse_number_list(group))
            .map(|rates| rates.into_iter().filter(|&r| r > 0).collect())
            .unwrap_or_default();

        Some(Self { codecs, rates })
    }

    pub fn supports(&self, codec: Codec) -> bool {
        self.codecs.iter().any(|entry| entry.codec == codec)
    }

    /// Entry for `codec`, preferring the requested PCM signedness.
    fn entry_for(&self, codec: Codec, signed: bool) -> Option<VsmCodec> {
        let mut candidates = self.codecs.iter().filter(|entry| entry.codec == codec);
        let first = candidates.clone().next().copied();
        candidates
            .find(|entry| codec != Codec::Pcm8 || entry.signed == signed)
            .copied()
            .or(first)
    }

    fn preferred_rate(&self) -> Option<u32> {
        if self.rates.contains(&DEFAULT_SAMPLE_RATE) {
            Some(DEFAULT_SAMPLE_RATE)
        } else {
            self.rates.first().copied()
        }
    }
}

/// The format to use for a playback and the code that selects it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsmSelection {
    pub format: VoiceFormat,
    pub code: u16,
}

impl VsmSelection {
    pub fn requested(format: VoiceFormat) -> Self {
        Self {
            format,
            code: default_code(&format),
        }
    }

    pub fn command(&self) -> String {
        format!("AT+VSM={},{}", self.code, self.format.rate)
    }
}

/// Pick the line format for this call.
///
/// With `negotiate` the best format the modem offers wins (μ-law, A-law,
/// 8-bit PCM; 8000 Hz or the first listed rate). Without it the requested
/// format is kept where supported and downgraded in the same order where not.
pub fn select(capabilities: Option<&Capabilities>, requested: VoiceFormat, negotiate: bool) -> VsmSelection {
    let Some(caps) = capabilities else {
        return VsmSelection::requested(requested);
    };

    let codec = if !negotiate && caps.supports(requested.codec) {
        requested.codec
    } else {
        match Codec::PREFERENCE.into_iter().find(|&codec| caps.supports(codec)) {
            Some(codec) => codec,
            None => return VsmSelection::requested(requested),
        }
    };

    let rate = if caps.rates.is_empty() || (!negotiate && caps.rates.contains(&requested.rate)) {
        requested.rate
    } else {
        caps.preferred_rate().unwrap_or(requested.rate)
    };

    let Some(entry) = caps.entry_for(codec, requested.signed) else {
        return VsmSelection::requested(requested);
    };

    let selection = VsmSelection {
        format: VoiceFormat {
            codec,
            rate,
            signed: entry.signed,
        },
        code: entry.code,
    };

    if !negotiate && selection.format != requested {
        warn!(
            "Requested voice format {} not supported by modem, using {}",
            requested, selection.format
        );
    }
    selection
}

/// Query the modem's capability list.
///
/// Unsolicited lines in between are skipped; `OK`/`ERROR` before any list,
/// a timeout or an unparsable list all mean "no information".
pub fn query_capabilities<C>(channel: &mut C, timings: &Timings) -> Result<Option<Capabilities>>
where
    C: CommandChannel + ?Sized,
{
    // A late OK from an earlier command would read as an empty capability list
    drain_lines(channel, DRAIN_WINDOW)?;
    channel.send_command("AT+VSM=?")?;

    let response = wait_for_line(channel, timings.vsm_timeout, |line| {
        line.contains('(') || line == "OK" || line.contains("ERROR")
    })?;

    let Some(response) = response else {
        debug!("No VSM capability response within {:?}", timings.vsm_timeout);
        return Ok(None);
    };

    let capabilities = Capabilities::parse(&response.text);
    match &capabilities {
        Some(caps) => debug!("VSM capabilities: {:?}", caps),
        None => debug!("Unusable VSM capability response: {}", response.text),
    }
    Ok(capabilities)
}

/// Query, select and apply the voice format for the current call.
pub fn negotiate<C>(channel: &mut C, requested: VoiceFormat, negotiate: bool, timings: &Timings) -> Result<VsmSelection>
where
    C: CommandChannel + ?Sized,
{
    let capabilities = query_capabilities(channel, timings)?;
    let selection = select(capabilities.as_ref(), requested, negotiate);

    // The query's own trailing OK must not acknowledge the selection
    drain_lines(channel, DRAIN_WINDOW)?;
    channel.send_command(&selection.command())?;
    if wait_for_tokens(channel, &["OK"], timings.vsm_timeout)?.is_none() {
        warn!("No OK after {}, continuing", selection.command());
    }

    info!("Voice format: {}", selection.format);
    Ok(selection)
}

/// Contents of each `( ... )` group, in order.
fn parenthesized_groups(line: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut rest = line;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else { break };
        groups.push(&after[..close]);
        rest = &after[close + 1..];
    }
    groups
}

/// Comma/space separated numbers and `a-b` ranges; `None` if any token is not.
fn parse_number_list(group: &str) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for token in group.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        match token.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo.trim().parse().ok()?;
                let hi: u32 = hi.trim().parse().ok()?;
                if hi < lo {
                    return None;
                }
                if hi - lo <= MAX_RANGE_SPAN {
                    values.extend(lo..=hi);
                } else {
                    values.push(lo);
                    if (lo..=hi).contains(&DEFAULT_SAMPLE_RATE) {
                        values.push(DEFAULT_SAMPLE_RATE);
                    }
                    values.push(hi);
                }
            }
            None => values.push(token.parse().ok()?),
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use std::time::Duration;

    fn requested() -> VoiceFormat {
        VoiceFormat::default()
    }

    fn quick_timings() -> Timings {
        Timings {
            vsm_timeout: Duration::from_millis(20),
            ..Timings::default()
        }
    }

    #[test]
    fn test_parse_codes_and_rates() {
        let caps = Capabilities::parse("+VSM: (0,1,128,130,131),(7200,8000,11025)").unwrap();
        assert_eq!(caps.codecs.len(), 5);
        assert_eq!(caps.rates, vec![7200, 8000, 11025]);
        assert!(caps.supports(Codec::Ulaw));
    }

    #[test]
    fn test_parse_space_delimited_and_ranges() {
        let caps = Capabilities::parse("(128-131) (8000 11025)").unwrap();
        assert_eq!(
            caps.codecs.iter().map(|c| c.code).collect::<Vec<_>>(),
            vec![128, 130, 131]
        );
        assert_eq!(caps.rates, vec![8000, 11025]);
    }

    #[test]
    fn test_parse_malformed_is_none() {
        assert_eq!(Capabilities::parse("+VSM: (abc,def),(x)"), None);
        assert_eq!(Capabilities::parse("+VSM: ()"), None);
        assert_eq!(Capabilities::parse("OK"), None);
        assert_eq!(Capabilities::parse("(200,201),(8000)"), None);
    }

    #[test]
    fn test_rate_group_optional() {
        let caps = Capabilities::parse("(4,5)").unwrap();
        assert!(caps.rates.is_empty());
        let selection = select(Some(&caps), requested(), true);
        assert_eq!(selection.format.codec, Codec::Ulaw);
        assert_eq!(selection.format.rate, 8000);
        assert_eq!(selection.code, 4);
    }

    #[test]
    fn test_negotiation_prefers_ulaw_over_alaw() {
        let caps = Capabilities::parse("(130,131,128),(8000)").unwrap();
        let selection = select(Some(&caps), requested(), true);
        assert_eq!(selection.format.codec, Codec::Ulaw);
        assert_eq!(selection.code, 131);
        assert_eq!(selection.command(), "AT+VSM=131,8000");
    }

    #[test]
    fn test_negotiation_uses_first_rate_without_8000() {
        let caps = Capabilities::parse("(130),(11025,7200)").unwrap();
        let selection = select(Some(&caps), requested(), true);
        assert_eq!(selection.format.codec, Codec::Alaw);
        assert_eq!(selection.format.rate, 11025);
    }

    #[test]
    fn test_no_information_keeps_request() {
        let request = VoiceFormat {
            codec: Codec::Alaw,
            rate: 7200,
            signed: false,
        };
        let selection = select(None, request, true);
        assert_eq!(selection.format, request);
        assert_eq!(selection.code, 130);
    }

    #[test]
    fn test_disabled_keeps_supported_request() {
        let caps = Capabilities::parse("(128,131),(8000,11025)").unwrap();
        let request = VoiceFormat {
            codec: Codec::Pcm8,
            rate: 11025,
            signed: false,
        };
        let selection = select(Some(&caps), request, false);
        assert_eq!(selection.format, request);
        assert_eq!(selection.code, 128);
    }

    #[test]
    fn test_disabled_downgrades_unsupported_request() {
        let caps = Capabilities::parse("(130,128),(7200)").unwrap();
        let request = VoiceFormat {
            codec: Codec::Ulaw,
            rate: 8000,
            signed: false,
        };
        let selection = select(Some(&caps), request, false);
        assert_eq!(selection.format.codec, Codec::Alaw);
        assert_eq!(selection.format.rate, 7200);
    }

    #[test]
    fn test_pcm_signedness_follows_request_when_offered() {
        let caps = Capabilities::parse("(0,1),(8000)").unwrap();
        let signed = VoiceFormat {
            signed: true,
            ..VoiceFormat::default()
        };
        let selection = select(Some(&caps), signed, true);
        assert_eq!(selection.code, 0);
        assert!(selection.format.signed);

        let selection = select(Some(&caps), VoiceFormat::default(), true);
        assert_eq!(selection.code, 1);
        assert!(!selection.format.signed);
    }

    #[test]
    fn test_query_skips_interleaved_lines() {
        let mut channel = ScriptedChannel::new();
        channel.reply_to("AT+VSM=?", &["RING", "+VSM: (128,131),(8000)", "OK"]);
        let caps = query_capabilities(&mut channel, &quick_timings()).unwrap().unwrap();
        assert!(caps.supports(Codec::Ulaw));
    }

    #[test]
    fn test_leftover_ok_does_not_hide_capabilities() {
        let mut channel = ScriptedChannel::new();
        channel.push_line("OK");
        channel.reply_to("AT+VSM=?", &["+VSM: (130,131),(8000)", "OK"]);
        channel.reply_to("AT+VSM=131", &["OK"]);

        let alaw = VoiceFormat {
            codec: Codec::Alaw,
            ..requested()
        };
        let selection = negotiate(&mut channel, alaw, true, &quick_timings()).unwrap();
        assert_eq!(selection.format.codec, Codec::Ulaw);
        assert_eq!(channel.commands(), &["AT+VSM=?", "AT+VSM=131,8000"]);
        assert_eq!(channel.pending_lines(), 0);
    }

    #[test]
    fn test_negotiate_with_malformed_response_keeps_request() {
        let mut channel = ScriptedChannel::new();
        channel.reply_to("AT+VSM=?", &["+VSM: (garbage),(more)", "OK"]);
        channel.reply_to("AT+VSM=128", &["OK"]);
        let selection = negotiate(&mut channel, requested(), true, &quick_timings()).unwrap();
        assert_eq!(selection.format, requested());
        assert_eq!(channel.commands().last().unwrap(), "AT+VSM=128,8000");
    }

    #[test]
    fn test_negotiate_with_error_response_keeps_request() {
        let mut channel = ScriptedChannel::new();
        channel.reply_to("AT+VSM=?", &["ERROR"]);
        let selection = negotiate(&mut channel, requested(), true, &quick_timings()).unwrap();
        assert_eq!(selection, VsmSelection::requested(requested()));
    }
}
