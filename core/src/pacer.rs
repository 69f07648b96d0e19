//! Real-time pacing of voice frames.
//!
//! Deadlines advance by each frame's playback duration from the previous
//! deadline, not from the time the write finished, so per-frame I/O latency
//! doesn't accumulate into drift.

use std::thread;
use std::time::{Duration, Instant};

use crate::channel::CommandChannel;
use crate::error::Result;
use crate::framing::{escape_dle, AudioFrame};

pub struct Pacer {
    rate: u32,
    next_deadline: Option<Instant>,
    frames_sent: usize,
    bytes_sent: usize,
}

impl Pacer {
    pub fn new(rate: u32) -> Self {
        Self {
            rate: rate.max(1),
            next_deadline: None,
            frames_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Playback time of `samples` at the line rate
    pub fn duration_of(&self, samples: usize) -> Duration {
        Duration::from_nanos(samples as u64 * 1_000_000_000 / self.rate as u64)
    }

    /// Escape and write one frame, then sleep until its playback slot ends.
    pub fn send<C>(&mut self, channel: &mut C, frame: &AudioFrame) -> Result<()>
    where
        C: CommandChannel + ?Sized,
    {
        if frame.is_empty() {
            return Ok(());
        }

        let start = *self.next_deadline.get_or_insert_with(Instant::now);
        channel.send(&escape_dle(&frame.bytes))?;
        self.frames_sent += 1;
        self.bytes_sent += frame.bytes.len();

        let deadline = start + self.duration_of(frame.samples);
        sleep_until(deadline);
        self.next_deadline = Some(deadline);
        Ok(())
    }

    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// Payload bytes before escaping
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::{frame_len, DLE, FRAME_DURATION_MS};

    #[test]
    fn test_n_frames_take_n_frame_durations() {
        let mut channel = ScriptedChannel::new();
        let mut pacer = Pacer::new(8000);
        let frame = AudioFrame::new(vec![0xFF; frame_len(8000)]);
        let frames = 15;

        let started = Instant::now();
        for _ in 0..frames {
            pacer.send(&mut channel, &frame).unwrap();
        }
        let elapsed = started.elapsed();

        let expected = Duration::from_millis(FRAME_DURATION_MS * frames as u64);
        let slack = Duration::from_millis(FRAME_DURATION_MS);
        assert!(elapsed + Duration::from_millis(1) >= expected, "too fast: {:?}", elapsed);
        assert!(elapsed < expected + slack, "too slow: {:?}", elapsed);
        assert_eq!(pacer.frames_sent(), frames);
    }

    #[test]
    fn test_late_frame_does_not_shift_schedule() {
        let mut channel = ScriptedChannel::new();
        let mut pacer = Pacer::new(8000);
        let frame = AudioFrame::new(vec![0xFF; frame_len(8000)]);

        let started = Instant::now();
        pacer.send(&mut channel, &frame).unwrap();
        // simulate slow work between frames, shorter than one frame
        thread::sleep(Duration::from_millis(12));
        for _ in 0..4 {
            pacer.send(&mut channel, &frame).unwrap();
        }
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_millis(100 + FRAME_DURATION_MS), "drifted: {:?}", elapsed);
    }

    #[test]
    fn test_frames_are_escaped_on_the_wire() {
        let mut channel = ScriptedChannel::new();
        let mut pacer = Pacer::new(8000);
        pacer.send(&mut channel, &AudioFrame::new(vec![1, DLE, 2])).unwrap();
        assert_eq!(channel.written(), &[1, DLE, DLE, 2]);
        assert_eq!(pacer.bytes_sent(), 3);
    }

    #[test]
    fn test_partial_frame_paced_by_its_length() {
        let pacer = Pacer::new(8000);
        assert_eq!(pacer.duration_of(80), Duration::from_millis(10));
        assert_eq!(pacer.duration_of(160), Duration::from_millis(20));
    }
}
