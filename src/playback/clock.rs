//! Wall-clock playback position.
//!
//! The clock is the authoritative source of "where playback is" for visualization.
//! It is driven by elapsed time since the playback start, not by the audio device's
//! own cursor, so the two may drift slightly apart.

use std::time::{Duration, Instant};

/// Tracks elapsed playback time, excluding time spent paused.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    started_at: Instant,
    /// Total time paused (accumulated on resume)
    pause_duration: Duration,
    /// When the current pause started
    pause_start_time: Option<Instant>,
}

impl PlaybackClock {
    /// Starts a clock at the current instant.
    pub fn start() -> Self {
        Self::start_at(Instant::now())
    }

    pub fn start_at(now: Instant) -> Self {
        Self {
            started_at: now,
            pause_duration: Duration::ZERO,
            pause_start_time: None,
        }
    }

    /// Resets the clock to zero, as on a playback restart.
    pub fn restart(&mut self) {
        self.restart_at(Instant::now());
    }

    pub fn restart_at(&mut self, now: Instant) {
        let was_paused = self.is_paused();
        *self = Self::start_at(now);
        if was_paused {
            self.pause_start_time = Some(now);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause_start_time.is_some()
    }

    /// Toggles between running and paused.
    pub fn toggle_pause(&mut self) {
        self.toggle_pause_at(Instant::now());
    }

    pub fn toggle_pause_at(&mut self, now: Instant) {
        match self.pause_start_time.take() {
            Some(pause_start) => {
                self.pause_duration += now.saturating_duration_since(pause_start);
            }
            None => {
                self.pause_start_time = Some(now);
            }
        }
    }

    /// Elapsed playback time at `now`, excluding paused time.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let total_elapsed = now.saturating_duration_since(self.started_at);
        let mut pause_time = self.pause_duration;

        if let Some(pause_start) = self.pause_start_time {
            pause_time += now.saturating_duration_since(pause_start);
        }

        total_elapsed.saturating_sub(pause_time)
    }

    /// Frame index reached at the natural playback rate.
    pub fn current_sample_position(&self, sample_rate: u32) -> i64 {
        self.sample_position_at(Instant::now(), sample_rate, 1.0)
    }

    /// Sample index at `now`, advanced `multiplier` raw samples per elapsed frame.
    pub fn sample_position_at(&self, now: Instant, sample_rate: u32, multiplier: f64) -> i64 {
        position_for_elapsed(self.elapsed_at(now), sample_rate, multiplier)
    }
}

/// Converts elapsed time into a sample index: `round(t * rate * multiplier)`.
pub fn position_for_elapsed(elapsed: Duration, sample_rate: u32, multiplier: f64) -> i64 {
    (elapsed.as_secs_f64() * sample_rate as f64 * multiplier).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_is_zero_at_start() {
        let t0 = Instant::now();
        let clock = PlaybackClock::start_at(t0);
        assert_eq!(clock.sample_position_at(t0, 44100, 2.0), 0);
        assert_eq!(clock.elapsed_at(t0), Duration::ZERO);
    }

    #[test]
    fn test_position_scales_with_rate_and_multiplier() {
        let t0 = Instant::now();
        let clock = PlaybackClock::start_at(t0);
        let now = t0 + Duration::from_millis(750);

        assert_eq!(clock.sample_position_at(now, 44100, 1.0), 33075);
        assert_eq!(clock.sample_position_at(now, 44100, 2.0), 66150);
        assert_eq!(
            clock.sample_position_at(now, 48000, 1.5),
            (0.75f64 * 48000.0 * 1.5).round() as i64
        );
    }

    #[test]
    fn test_position_rounds_to_nearest() {
        assert_eq!(position_for_elapsed(Duration::from_micros(30), 44100, 1.0), 1);
        assert_eq!(position_for_elapsed(Duration::from_micros(10), 44100, 1.0), 0);
    }

    #[test]
    fn test_monotonic_while_playing() {
        let t0 = Instant::now();
        let clock = PlaybackClock::start_at(t0);
        let mut previous = 0;
        for ms in (0..2000).step_by(7) {
            let position = clock.sample_position_at(t0 + Duration::from_millis(ms), 44100, 2.0);
            assert!(position >= previous);
            previous = position;
        }
    }

    #[test]
    fn test_pause_excludes_paused_time() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::start_at(t0);

        clock.toggle_pause_at(t0 + Duration::from_secs(1));
        assert!(clock.is_paused());
        assert_eq!(clock.elapsed_at(t0 + Duration::from_secs(3)), Duration::from_secs(1));

        clock.toggle_pause_at(t0 + Duration::from_secs(3));
        assert!(!clock.is_paused());
        assert_eq!(clock.elapsed_at(t0 + Duration::from_secs(4)), Duration::from_secs(2));
    }

    #[test]
    fn test_restart_resets_to_zero() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::start_at(t0);
        let later = t0 + Duration::from_secs(5);

        clock.restart_at(later);
        assert_eq!(clock.sample_position_at(later, 44100, 2.0), 0);
        assert_eq!(
            clock.sample_position_at(later + Duration::from_secs(1), 44100, 1.0),
            44100
        );
    }

    #[test]
    fn test_restart_keeps_pause_state() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::start_at(t0);
        clock.toggle_pause_at(t0 + Duration::from_secs(1));

        clock.restart_at(t0 + Duration::from_secs(2));
        assert!(clock.is_paused());
        assert_eq!(clock.elapsed_at(t0 + Duration::from_secs(10)), Duration::ZERO);
    }
}
