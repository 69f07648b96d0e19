//! Ring/caller-ID tracking for the single line.
//!
//! The tracker is pure: it consumes classified status lines and tells the
//! caller what to do, it never touches the modem itself.

use crate::status::LineStatusEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Idle,
    RingingUnidentified,
    RingingIdentified(String),
}

/// The one call currently ringing on the line, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSession {
    pub caller: Option<String>,
    pub rings: u32,
    pub active: bool,
}

impl CallSession {
    pub fn state(&self) -> CallState {
        match (&self.caller, self.active) {
            (_, false) => CallState::Idle,
            (Some(caller), true) => CallState::RingingIdentified(caller.clone()),
            (None, true) => CallState::RingingUnidentified,
        }
    }
}

/// What the handler has to do after a status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallAction {
    /// Ring threshold reached: answer with audio or hang up
    Decide(CallSession),
    /// The caller went away (busy / no carrier) before the decision
    Busy(CallSession),
}

#[derive(Debug)]
pub struct CallTracker {
    session: CallSession,
    ring_threshold: u32,
}

impl CallTracker {
    pub fn new(ring_threshold: u32) -> Self {
        Self {
            session: CallSession::default(),
            ring_threshold: ring_threshold.max(1),
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn state(&self) -> CallState {
        self.session.state()
    }

    /// Apply one status line. Caller ID numbers should already be normalized.
    ///
    /// Any returned action carries the finished session; the tracker itself
    /// is back to idle at that point.
    pub fn advance(&mut self, event: LineStatusEvent) -> Option<CallAction> {
        match event {
            LineStatusEvent::CallerId(number) => {
                let number = number.trim();
                self.session = CallSession {
                    caller: (!number.is_empty()).then(|| number.to_string()),
                    rings: 0,
                    active: true,
                };
                None
            }
            LineStatusEvent::Ring => {
                self.session.active = true;
                self.session.rings += 1;
                if self.session.rings >= self.ring_threshold {
                    Some(CallAction::Decide(self.reset()))
                } else {
                    None
                }
            }
            event if event.is_call_end() => {
                if self.session.active {
                    Some(CallAction::Busy(self.reset()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn reset(&mut self) -> CallSession {
        std::mem::take(&mut self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(number: &str) -> LineStatusEvent {
        LineStatusEvent::CallerId(number.to_string())
    }

    #[test]
    fn test_caller_id_starts_identified_session() {
        let mut tracker = CallTracker::new(3);
        assert_eq!(tracker.advance(caller("+59899837840")), None);
        assert_eq!(tracker.state(), CallState::RingingIdentified("+59899837840".to_string()));
        assert_eq!(tracker.session().rings, 0);
    }

    #[test]
    fn test_ring_from_idle_starts_unidentified_session() {
        let mut tracker = CallTracker::new(3);
        tracker.advance(LineStatusEvent::Ring);
        assert_eq!(tracker.state(), CallState::RingingUnidentified);
        assert_eq!(tracker.session().rings, 1);
    }

    #[test]
    fn test_caller_id_resets_ring_count() {
        let mut tracker = CallTracker::new(5);
        tracker.advance(LineStatusEvent::Ring);
        tracker.advance(LineStatusEvent::Ring);
        assert_eq!(tracker.session().rings, 2);
        tracker.advance(caller("123"));
        assert_eq!(tracker.session().rings, 0);
    }

    #[test]
    fn test_threshold_fires_once_and_resets() {
        let mut tracker = CallTracker::new(3);
        tracker.advance(caller("123"));
        assert_eq!(tracker.advance(LineStatusEvent::Ring), None);
        assert_eq!(tracker.advance(LineStatusEvent::Ring), None);
        let action = tracker.advance(LineStatusEvent::Ring);
        assert_eq!(
            action,
            Some(CallAction::Decide(CallSession {
                caller: Some("123".to_string()),
                rings: 3,
                active: true,
            }))
        );
        assert_eq!(tracker.state(), CallState::Idle);
        assert_eq!(tracker.session().rings, 0);
    }

    #[test]
    fn test_busy_only_when_active() {
        let mut tracker = CallTracker::new(3);
        assert_eq!(tracker.advance(LineStatusEvent::NoCarrier), None);
        tracker.advance(LineStatusEvent::Ring);
        let action = tracker.advance(LineStatusEvent::NoCarrier);
        assert!(matches!(action, Some(CallAction::Busy(ref s)) if s.rings == 1 && s.caller.is_none()));
        assert_eq!(tracker.advance(LineStatusEvent::Busy), None);
    }

    #[test]
    fn test_noise_lines_are_ignored() {
        let mut tracker = CallTracker::new(2);
        tracker.advance(LineStatusEvent::Ring);
        tracker.advance(LineStatusEvent::Ok);
        tracker.advance(LineStatusEvent::Unrecognized("DATE = 1018".to_string()));
        assert_eq!(tracker.session().rings, 1);
    }

    #[test]
    fn test_empty_caller_id_is_unidentified() {
        let mut tracker = CallTracker::new(2);
        tracker.advance(caller("  "));
        assert_eq!(tracker.state(), CallState::RingingUnidentified);
    }

    #[test]
    fn test_random_event_sequences_keep_invariants() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut tracker = CallTracker::new(3);
        let mut decisions = 0;

        for _ in 0..5000 {
            let before = tracker.session().clone();
            let event = match rng.gen_range(0..6) {
                0 => caller("555"),
                1 | 2 => LineStatusEvent::Ring,
                3 => LineStatusEvent::Busy,
                4 => LineStatusEvent::Ok,
                _ => LineStatusEvent::Unrecognized("x".to_string()),
            };
            let is_ring = event == LineStatusEvent::Ring;
            let is_caller = matches!(event, LineStatusEvent::CallerId(_));
            let action = tracker.advance(event);

            let after = tracker.session();
            if is_caller {
                assert_eq!(after.rings, 0);
            } else if !is_ring {
                assert!(after.rings <= before.rings);
            }
            match action {
                Some(CallAction::Decide(session)) => {
                    decisions += 1;
                    assert_eq!(session.rings, 3);
                    assert_eq!(tracker.state(), CallState::Idle);
                }
                Some(CallAction::Busy(session)) => {
                    assert!(session.active);
                    assert_eq!(tracker.state(), CallState::Idle);
                }
                None => {}
            }
            assert!(after.rings < 3);
        }
        assert!(decisions > 0);
    }
}
