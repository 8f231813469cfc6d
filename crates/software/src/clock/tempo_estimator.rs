use embassy_time::Duration;

/// Inter-pulse intervals kept for averaging: four beats at 24 PPQN.
pub const INTERVAL_CAPACITY: usize = 96;

/// Intervals needed before an estimate is reported: half a beat.
pub const MIN_SAMPLES: usize = 12;

/// Smallest change in the rounded estimate that is reported.
pub const HYSTERESIS_BPM: u16 = 5;

/// Deviation from the running average, in percent, treated as a tempo change rather than jitter.
pub const DISCONTINUITY_PERCENT: u64 = 15;

/// Microseconds per minute divided by 24 PPQN.
const MICROS_PER_MINUTE_PER_PPQN: u64 = 2_500_000;

/// Estimates the tempo of an external MIDI clock from the spacing of its pulses.
///
/// Intervals are kept in a ring buffer with a running sum, so each pulse costs the same however full the buffer is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoEstimator {
    intervals: [u32; INTERVAL_CAPACITY],
    head: usize,
    len: usize,
    sum: u64,
    reported: Option<u16>,
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoEstimator {
    /// An estimator with no history.
    pub const fn new() -> Self {
        Self {
            intervals: [0; INTERVAL_CAPACITY],
            head: 0,
            len: 0,
            sum: 0,
            reported: None,
        }
    }

    /// Forgets every interval and the reported tempo.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of intervals currently averaged.
    pub fn samples(&self) -> usize {
        self.len
    }

    /// Most recently reported tempo; `None` until enough pulses have been seen.
    pub fn bpm(&self) -> Option<u16> {
        self.reported
    }

    /// Records the interval between two pulses.
    ///
    /// Returns `true` when the interval was far enough from the average to be treated as a tempo change; the history
    /// is discarded in that case and the estimate starts over from this interval.
    pub fn record(&mut self, interval: Duration) -> bool {
        let micros = u32::try_from(interval.as_micros()).unwrap_or(u32::MAX);

        let discontinuity = self.len >= MIN_SAMPLES && {
            let scaled = u64::from(micros) * self.len as u64;
            scaled.abs_diff(self.sum) * 100 > self.sum * DISCONTINUITY_PERCENT
        };
        if discontinuity {
            self.reset();
        }

        if self.len == INTERVAL_CAPACITY {
            self.sum -= u64::from(self.intervals[self.head]);
        } else {
            self.len += 1;
        }
        self.intervals[self.head] = micros;
        self.sum += u64::from(micros);
        self.head = (self.head + 1) % INTERVAL_CAPACITY;

        if let Some(estimate) = self.estimate() {
            let changed = self
                .reported
                .is_none_or(|reported| estimate.abs_diff(reported) >= HYSTERESIS_BPM);
            if changed {
                self.reported = Some(estimate);
            }
        }

        discontinuity
    }

    /// Rounded tempo implied by the current average, ignoring hysteresis.
    fn estimate(&self) -> Option<u16> {
        if self.len < MIN_SAMPLES || self.sum == 0 {
            return None;
        }
        // bpm = 60 / (average * 24) = 2_500_000 * len / sum, rounded to nearest
        let numerator = 2 * MICROS_PER_MINUTE_PER_PPQN * self.len as u64 + self.sum;
        let bpm = numerator / (2 * self.sum);
        Some(u16::try_from(bpm).unwrap_or(u16::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(estimator: &mut TempoEstimator, micros: u64, count: usize) -> bool {
        let mut discontinuity = false;
        for _ in 0..count {
            discontinuity |= estimator.record(Duration::from_micros(micros));
        }
        discontinuity
    }

    #[test]
    fn unsynced_until_half_a_beat() {
        let mut estimator = TempoEstimator::new();
        feed(&mut estimator, 20_830, MIN_SAMPLES - 1);
        assert_eq!(None, estimator.bpm(), "Expected left but got right");
        feed(&mut estimator, 20_830, 1);
        assert_eq!(Some(120), estimator.bpm(), "Expected left but got right");
    }

    #[test]
    fn settles_on_120_bpm() {
        let mut estimator = TempoEstimator::new();
        assert!(!feed(&mut estimator, 20_830, 96));
        assert_eq!(Some(120), estimator.bpm(), "Expected left but got right");
        assert_eq!(INTERVAL_CAPACITY, estimator.samples(), "Expected left but got right");
    }

    #[test]
    fn small_drifts_are_not_reported() {
        let mut estimator = TempoEstimator::new();
        feed(&mut estimator, 20_830, 96);
        // 20 ms is 125 BPM, only 4% faster, so the buffer is kept and the average moves gradually
        assert!(!feed(&mut estimator, 20_000, 48));
        assert_eq!(
            Some(120),
            estimator.bpm(),
            "A ~122 BPM average is within hysteresis; expected left but got right"
        );
        feed(&mut estimator, 20_000, 48);
        assert_eq!(Some(125), estimator.bpm(), "Expected left but got right");
    }

    #[test]
    fn large_jumps_reset_the_history() {
        let mut estimator = TempoEstimator::new();
        feed(&mut estimator, 20_830, 96);
        // 10 ms is 250 BPM
        assert!(estimator.record(Duration::from_micros(10_000)));
        assert_eq!(None, estimator.bpm(), "Expected left but got right");
        assert_eq!(1, estimator.samples(), "Expected left but got right");
        feed(&mut estimator, 10_000, MIN_SAMPLES - 1);
        assert_eq!(Some(250), estimator.bpm(), "Expected left but got right");
    }
}
