//! Rate-based visual indicator.
//!
//! The user LED is driven off a free-running hardware up-counter: the
//! controller compares the counter against a duty threshold on every
//! [`Indicator::apply`] call and asserts the output while the count is below
//! it. The output level is re-derived on every call; software never caches
//! it beyond the physical line state.
//!
//! The counter wraps at the programmed period in hardware and is never reset
//! by software, so a rate change becomes visible at the next counter wrap.
//! Readout races against the hardware's own compare-reload are advisory-only
//! (the consumer is a human looking at an LED) and need no correction.

use embedded_hal::digital::OutputPin;

/// Indicator rate setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorRate {
    /// Indefinitely dim.
    #[default]
    Off,
    /// Slow blink.
    Slow,
    /// Medium-paced blink.
    Medium,
    /// Fast blink.
    Fast,
    /// Indefinitely lit.
    On,
}

/// One blink cadence: counter period and the fraction of it spent lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RatePlan {
    /// Counter wrap value, in counter ticks.
    pub period: u16,
    /// Portion of the period with the output asserted, in percent.
    /// Values above 100 behave as 100.
    pub duty_percent: u8,
}

impl RatePlan {
    /// Counter value below which the output is asserted.
    #[allow(clippy::arithmetic_side_effects)] // u16 * 100 fits u32; result / 100 <= period fits u16
    pub const fn threshold(&self) -> u16 {
        let duty = if self.duty_percent > 100 {
            100
        } else {
            self.duty_percent
        };
        ((self.period as u32 * duty as u32) / 100) as u16
    }
}

/// Blink cadences for the three blinking rates.
///
/// The defaults reproduce the board's stock behavior with the indicator
/// counter clocked at 23.4375 kHz: 1 s / 90 % lit for slow, 0.5 s / 80 % for
/// medium, 0.3 s / 50 % for fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateTable {
    /// Cadence used by [`IndicatorRate::Slow`].
    pub slow: RatePlan,
    /// Cadence used by [`IndicatorRate::Medium`].
    pub medium: RatePlan,
    /// Cadence used by [`IndicatorRate::Fast`].
    pub fast: RatePlan,
}

impl Default for RateTable {
    fn default() -> Self {
        RateTable {
            slow: RatePlan {
                period: 23_438,
                duty_percent: 90,
            },
            medium: RatePlan {
                period: 11_719,
                duty_percent: 80,
            },
            fast: RatePlan {
                period: 7_032,
                duty_percent: 50,
            },
        }
    }
}

/// Free-running hardware up-counter that wraps at a programmable period.
///
/// This is the seam to the timer peripheral behind the indicator: `count`
/// reads the current value, `set_period` programs the wrap (compare-reload)
/// value. The counter keeps running across period writes; software never
/// resets it.
pub trait PeriodicCounter {
    /// Program the counter wrap value.
    fn set_period(&mut self, period: u16);

    /// Read the current counter value.
    fn count(&self) -> u16;
}

/// The indicator state machine.
///
/// Owns the counter and output-pin seams. [`set_rate`](Indicator::set_rate)
/// is unconditional and takes effect on the next
/// [`apply`](Indicator::apply); `apply` is intended to run once per main-loop
/// iteration.
#[derive(Debug)]
pub struct Indicator<C, P> {
    counter: C,
    pin: P,
    rate: IndicatorRate,
    table: RateTable,
    programmed: Option<u16>,
}

impl<C: PeriodicCounter, P: OutputPin> Indicator<C, P> {
    /// An indicator using the stock [`RateTable`], initially
    /// [`IndicatorRate::Off`].
    pub fn new(counter: C, pin: P) -> Self {
        Indicator::with_table(counter, pin, RateTable::default())
    }

    /// An indicator with explicit blink cadences.
    pub fn with_table(counter: C, pin: P, table: RateTable) -> Self {
        Indicator {
            counter,
            pin,
            rate: IndicatorRate::Off,
            table,
            programmed: None,
        }
    }

    /// Request a new rate. Never rejected; visible on the next `apply`.
    pub fn set_rate(&mut self, rate: IndicatorRate) {
        self.rate = rate;
    }

    /// The currently requested rate.
    pub fn rate(&self) -> IndicatorRate {
        self.rate
    }

    /// Recompute and drive the output level for the current rate.
    pub fn apply(&mut self) -> Result<(), P::Error> {
        match self.rate {
            IndicatorRate::Off => self.pin.set_low(),
            IndicatorRate::On => self.pin.set_high(),
            IndicatorRate::Slow => self.blink(self.table.slow),
            IndicatorRate::Medium => self.blink(self.table.medium),
            IndicatorRate::Fast => self.blink(self.table.fast),
        }
    }

    fn blink(&mut self, plan: RatePlan) -> Result<(), P::Error> {
        if self.programmed != Some(plan.period) {
            self.counter.set_period(plan.period);
            self.programmed = Some(plan.period);
        }
        if self.counter.count() < plan.threshold() {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }

    /// The counter seam.
    pub fn counter(&self) -> &C {
        &self.counter
    }

    /// Mutable access to the counter seam.
    pub fn counter_mut(&mut self) -> &mut C {
        &mut self.counter
    }

    /// The output-pin seam.
    pub fn pin(&self) -> &P {
        &self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockCounter, MockPin};

    fn indicator() -> Indicator<MockCounter, MockPin> {
        Indicator::new(MockCounter::new(), MockPin::new())
    }

    #[test]
    fn off_forces_the_output_low() {
        let mut ind = indicator();
        ind.counter_mut().set_count(1);
        let _ = ind.apply();
        assert!(!ind.pin().is_set_high());
    }

    #[test]
    fn on_forces_the_output_high() {
        let mut ind = indicator();
        ind.set_rate(IndicatorRate::On);
        let _ = ind.apply();
        assert!(ind.pin().is_set_high());
    }

    #[test]
    fn fast_asserts_below_the_duty_threshold() {
        // Stock fast plan: period 7032, 50 % duty -> threshold 3516.
        let mut ind = indicator();
        ind.set_rate(IndicatorRate::Fast);
        ind.counter_mut().set_count(3_515);
        let _ = ind.apply();
        assert!(ind.pin().is_set_high());

        ind.counter_mut().set_count(3_516);
        let _ = ind.apply();
        assert!(!ind.pin().is_set_high());
    }

    #[test]
    fn slow_uses_a_90_percent_duty() {
        // Stock slow plan: period 23438, 90 % duty -> threshold 21094.
        let mut ind = indicator();
        ind.set_rate(IndicatorRate::Slow);
        ind.counter_mut().set_count(21_093);
        let _ = ind.apply();
        assert!(ind.pin().is_set_high());

        ind.counter_mut().set_count(21_094);
        let _ = ind.apply();
        assert!(!ind.pin().is_set_high());
    }

    #[test]
    fn rate_change_takes_effect_on_the_next_apply() {
        let mut ind = indicator();
        ind.set_rate(IndicatorRate::On);
        let _ = ind.apply();
        assert!(ind.pin().is_set_high());

        // The request alone does not touch the line.
        ind.set_rate(IndicatorRate::Off);
        assert!(ind.pin().is_set_high());
        let _ = ind.apply();
        assert!(!ind.pin().is_set_high());
    }

    #[test]
    fn period_is_programmed_once_per_state_entry() {
        let mut ind = indicator();
        ind.set_rate(IndicatorRate::Medium);
        let _ = ind.apply();
        let _ = ind.apply();
        let _ = ind.apply();
        assert_eq!(ind.counter().period(), Some(11_719));
        assert_eq!(ind.counter().period_writes(), 1);

        ind.set_rate(IndicatorRate::Fast);
        let _ = ind.apply();
        assert_eq!(ind.counter().period(), Some(7_032));
        assert_eq!(ind.counter().period_writes(), 2);
    }

    #[test]
    fn duty_above_100_percent_behaves_as_always_lit_within_the_period() {
        let plan = RatePlan {
            period: 1_000,
            duty_percent: 150,
        };
        assert_eq!(plan.threshold(), 1_000);
    }
}
