use crate::configuration::{ClockRate, Config};
use embassy_time::Duration;

/// MIDI clock resolution: pulses per quarter note.
pub const PPQN: u32 = 24;

const NANOS_PER_MINUTE: u128 = 60_000_000_000;

/// Swing is expressed in percent; a straight pair splits 50/50.
const STRAIGHT: u128 = 50;

/// Internal clock timing: tempo, rate, swing and division, and the exact pulse schedule they produce.
///
/// Pulses are grouped into two-step pairs of `2 · division` pulses. Every pulse of the first step lasts
/// `2 · base · swing / 100` and every pulse of the second `2 · base · (100 − swing) / 100`, where
/// `base = 60 / (bpm · 24)` seconds scaled by the rate. Offsets are computed with integer arithmetic from the start of
/// a pair, so no rounding error accumulates however many pulses elapse.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tempo {
    bpm: u16,
    rate: ClockRate,
    swing: u8,
    division: u8,
}

impl Tempo {
    /// Tempo from already-sanitized values.
    pub fn new(bpm: u16, rate: ClockRate, swing: u8, division: u8) -> Self {
        Self {
            bpm: bpm.max(1),
            rate,
            swing: swing.clamp(50, 100),
            division: division.max(1),
        }
    }

    /// Tempo described by a configuration.
    pub fn from_config(config: &Config) -> Self {
        let config = config.sanitized();
        Self::new(config.bpm, config.rate, config.swing, config.division)
    }

    /// Beats per minute before the rate is applied.
    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    /// Multiplier or divider applied to the base interval.
    pub fn rate(&self) -> ClockRate {
        self.rate
    }

    /// Clock pulses per step.
    pub fn division(&self) -> u8 {
        self.division
    }

    /// Percentage of a pair given to its first step.
    pub fn swing(&self) -> u8 {
        self.swing
    }

    /// Nanoseconds per minute, scaled by the rate's divider.
    fn numerator(&self) -> u128 {
        let (_, divider) = self.rate.factor();
        NANOS_PER_MINUTE * u128::from(divider)
    }

    /// Pulses per minute, scaled by the rate's multiplier.
    fn denominator(&self) -> u128 {
        let (multiplier, _) = self.rate.factor();
        u128::from(self.bpm) * u128::from(PPQN) * u128::from(multiplier)
    }

    /// Position of the start of `pulse` (counted from the start of a pair) in units of `base / 50`.
    fn units(&self, pulse: u64) -> u128 {
        let division = u128::from(self.division);
        let swing = u128::from(self.swing);
        let pulse = u128::from(pulse);
        let pairs = pulse / (2 * division);
        let within = pulse % (2 * division);
        let within_units = if within <= division {
            within * swing
        } else {
            swing * division + (within - division) * (100 - swing)
        };
        pairs * 100 * division + within_units
    }

    /// Time from the start of the pulse at `phase` within a pair until `pulses` further pulses have elapsed.
    pub fn offset(&self, phase: u32, pulses: u64) -> Duration {
        let start = u64::from(phase);
        let units = self.units(start + pulses) - self.units(start);
        let nanos = self.numerator() * units / (STRAIGHT * self.denominator());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Unswung pulse interval, in nanoseconds.
    pub fn base_interval_nanos(&self) -> f64 {
        self.numerator() as f64 / self.denominator() as f64
    }

    /// Duration of the pulse at `phase` within a pair, in nanoseconds, without rounding to timer ticks.
    pub fn pulse_delay_nanos(&self, phase: u32) -> f64 {
        let phase = u64::from(phase);
        let units = self.units(phase + 1) - self.units(phase);
        (self.numerator() * units) as f64 / (STRAIGHT * self.denominator()) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(expected: f64, actual: f64, tolerance: f64) -> bool {
        let delta = expected - actual;
        delta <= tolerance && delta >= -tolerance
    }

    #[test]
    fn base_interval_at_120_bpm() {
        let tempo = Tempo::new(120, ClockRate::Normal, 50, 6);
        // 60 / (120 * 24) s
        assert!(close(20_833_333.333, tempo.base_interval_nanos(), 1.0));
    }

    #[test]
    fn rate_scales_the_base_interval() {
        let normal = Tempo::new(100, ClockRate::Normal, 50, 6).base_interval_nanos();
        let doubled = Tempo::new(100, ClockRate::Mul2, 50, 6).base_interval_nanos();
        let eighth = Tempo::new(100, ClockRate::Div8, 50, 6).base_interval_nanos();
        assert!(close(normal / 2.0, doubled, 1e-3));
        assert!(close(normal * 8.0, eighth, 1e-3));
    }

    #[test]
    fn swing_pairs_sum_to_twice_the_base_interval() {
        for swing in 50..=100 {
            for rate in [ClockRate::Div4, ClockRate::Normal, ClockRate::Mul8] {
                let tempo = Tempo::new(97, rate, swing, 6);
                let base = tempo.base_interval_nanos();
                for phase in 0..6 {
                    let first = tempo.pulse_delay_nanos(phase);
                    let second = tempo.pulse_delay_nanos(phase + 6);
                    assert!(
                        close(2.0 * base, first + second, 1e-3),
                        "swing {} phase {}: {} + {} != 2 * {}",
                        swing,
                        phase,
                        first,
                        second,
                        base
                    );
                }
            }
        }
    }

    #[test]
    fn swing_lengthens_the_first_step() {
        let tempo = Tempo::new(120, ClockRate::Normal, 66, 6);
        let base = tempo.base_interval_nanos();
        assert!(close(base * 1.32, tempo.pulse_delay_nanos(0), 1e-3));
        assert!(close(base * 0.68, tempo.pulse_delay_nanos(11), 1e-3));
    }

    #[test]
    fn offsets_are_exact_over_many_pairs() {
        // 125 BPM gives a 20 ms pulse, which divides evenly into nanoseconds
        let tempo = Tempo::new(125, ClockRate::Normal, 75, 6);
        assert_eq!(
            Duration::from_millis(20 * 12 * 10_000),
            tempo.offset(0, 12 * 10_000),
            "Expected left but got right"
        );
        // offsets starting mid-pair cover the same span
        assert_eq!(
            Duration::from_millis(20 * 12),
            tempo.offset(7, 12),
            "Expected left but got right"
        );
    }
}
