//! Refresh cadence for the waveform and spectrum views.
//!
//! Each view is gated on its own fixed interval, independent of how often the frame
//! loop runs. Spectral analysis is the expensive side, so it gets its own slower gate.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

/// Gate that arms once per elapsed interval.
#[derive(Debug, Clone)]
pub struct CadenceGate {
    interval: Duration,
    accumulated: Duration,
}

impl CadenceGate {
    /// Creates a gate in the waiting state.
    ///
    /// # Errors
    /// - If the interval is zero
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(anyhow!("Cadence interval must be positive"));
        }
        Ok(Self {
            interval,
            accumulated: Duration::ZERO,
        })
    }

    /// Adds elapsed time and reports whether the gated action should fire now.
    ///
    /// The gate fires as soon as the accumulated time reaches the interval, including
    /// when it lands exactly on the boundary. Firing keeps the remainder past the last
    /// whole interval, so the accumulator is always below the interval afterwards.
    /// Whole intervals skipped by a long frame are dropped rather than replayed.
    pub fn advance(&mut self, delta: Duration) -> bool {
        self.accumulated += delta;
        if self.accumulated < self.interval {
            return false;
        }

        let remainder = self.accumulated.as_nanos() % self.interval.as_nanos();
        self.accumulated = Duration::from_nanos(remainder as u64);
        true
    }

    #[cfg(test)]
    fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }
}

/// Which views should refresh on this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CadenceTick {
    pub waveform: bool,
    pub spectrum: bool,
}

impl CadenceTick {
    pub fn any(&self) -> bool {
        self.waveform || self.spectrum
    }
}

/// Owns the waveform and spectrum gates and the previous frame instant.
#[derive(Debug, Clone)]
pub struct RenderCadence {
    waveform: CadenceGate,
    spectrum: CadenceGate,
    last_poll: Option<Instant>,
}

impl RenderCadence {
    /// # Errors
    /// - If either interval is zero
    pub fn new(waveform_interval: Duration, spectrum_interval: Duration) -> Result<Self> {
        Ok(Self {
            waveform: CadenceGate::new(waveform_interval)
                .map_err(|e| anyhow!("Waveform refresh: {e}"))?,
            spectrum: CadenceGate::new(spectrum_interval)
                .map_err(|e| anyhow!("Spectrum refresh: {e}"))?,
            last_poll: None,
        })
    }

    /// Advances both gates by the time since the previous poll.
    ///
    /// The first poll only records the instant.
    pub fn poll(&mut self, now: Instant) -> CadenceTick {
        let delta = self
            .last_poll
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_poll = Some(now);

        CadenceTick {
            waveform: self.waveform.advance(delta),
            spectrum: self.spectrum.advance(delta),
        }
    }

    /// Returns both gates to waiting, as on a playback restart.
    pub fn reset(&mut self) {
        self.waveform.reset();
        self.spectrum.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        assert!(CadenceGate::new(Duration::ZERO).is_err());
        assert!(RenderCadence::new(Duration::ZERO, Duration::from_millis(20)).is_err());
        assert!(RenderCadence::new(Duration::from_millis(16), Duration::ZERO).is_err());
    }

    #[test]
    fn test_fires_once_per_complete_interval() {
        let interval = Duration::from_micros(20_833);
        let mut gate = CadenceGate::new(interval).unwrap();

        let deltas = [3u64, 7, 1, 11, 5, 2, 13, 4, 9, 6]
            .iter()
            .cycle()
            .take(500)
            .map(|ms| Duration::from_millis(*ms))
            .collect::<Vec<_>>();

        let mut fires = 0u128;
        let mut total = Duration::ZERO;
        for delta in deltas {
            total += delta;
            if gate.advance(delta) {
                fires += 1;
            }
            assert!(gate.accumulated() < interval);
        }

        assert_eq!(fires, total.as_nanos() / interval.as_nanos());
    }

    #[test]
    fn test_waiting_until_interval_elapses() {
        let mut gate = CadenceGate::new(Duration::from_millis(10)).unwrap();
        assert!(!gate.advance(Duration::from_millis(4)));
        assert!(!gate.advance(Duration::from_millis(5)));
        assert!(gate.advance(Duration::from_millis(1)));
        assert_eq!(gate.accumulated(), Duration::ZERO);
    }

    #[test]
    fn test_fires_on_exact_boundary() {
        let interval = Duration::from_micros(16_667);
        let mut gate = CadenceGate::new(interval).unwrap();

        assert!(!gate.advance(interval - Duration::from_nanos(1)));
        assert!(gate.advance(Duration::from_nanos(1)));
        assert!(gate.advance(interval));
        assert_eq!(gate.accumulated(), Duration::ZERO);
    }

    #[test]
    fn test_long_frame_fires_once_and_stays_below_interval() {
        let mut gate = CadenceGate::new(Duration::from_millis(10)).unwrap();
        assert!(gate.advance(Duration::from_millis(35)));
        assert_eq!(gate.accumulated(), Duration::from_millis(5));
        assert!(!gate.advance(Duration::from_millis(4)));
    }

    #[test]
    fn test_gates_fire_independently() {
        let t0 = Instant::now();
        let mut cadence =
            RenderCadence::new(Duration::from_millis(10), Duration::from_millis(25)).unwrap();

        assert_eq!(cadence.poll(t0), CadenceTick::default());

        let mut waveform_fires = 0;
        let mut spectrum_fires = 0;
        let mut both = 0;
        for ms in 1..=100 {
            let tick = cadence.poll(t0 + Duration::from_millis(ms));
            waveform_fires += tick.waveform as u32;
            spectrum_fires += tick.spectrum as u32;
            both += (tick.waveform && tick.spectrum) as u32;
        }

        assert_eq!(waveform_fires, 10);
        assert_eq!(spectrum_fires, 4);
        assert_eq!(both, 2);
    }

    #[test]
    fn test_reset_returns_to_waiting() {
        let t0 = Instant::now();
        let mut cadence =
            RenderCadence::new(Duration::from_millis(10), Duration::from_millis(10)).unwrap();
        cadence.poll(t0);
        cadence.poll(t0 + Duration::from_millis(9));
        cadence.reset();

        assert!(!cadence.poll(t0 + Duration::from_millis(18)).any());
        assert!(cadence.poll(t0 + Duration::from_millis(19)).any());
    }
}
