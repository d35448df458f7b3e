//! Compile-time PWM timing configuration.
//!
//! Every timing value the builder and executor use is derived from a
//! [`PwmConfig`] and expressed in timer counts. Configurations are meant to be
//! declared as `const` items through [`PwmConfig::validated`], which turns an
//! inconsistent configuration into a build failure.

use core::fmt;

/// Largest delta, in counts, the executor can arm on a wrapping 16-bit counter.
pub const MAX_DELTA_COUNTS: u32 = 0x7FFF;

/// Timing parameters for the commutation engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmConfig {
    /// Frequency of the free-running counter in kHz. Must be a whole number of MHz.
    pub timer_freq_khz: u32,
    /// PWM cycle frequency in Hz
    pub pwm_freq_hz: u32,
    /// Break-before-make gap between a high-side turning off and its low-side turning on.
    pub dead_time_us: u16,
    /// Deltas shorter than this are not left to the interrupt controller; the
    /// executor spins for them instead.
    pub min_timer_delta_us: u16,
    /// Duty value meaning 100%
    pub duty_full_scale: u16,
    /// Delay before the first compare match after start, in counts
    pub startup_delay_counts: u16,
}

/// Reasons a [`PwmConfig`] is rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Timer clock is zero or not a whole number of MHz
    TimerFrequency,
    /// PWM frequency is zero or does not divide the timer clock evenly
    PwmFrequency,
    /// One PWM cycle does not fit in half the 16-bit counter range
    CycleTooLong,
    /// Dead time is zero
    DeadTime,
    /// Three serialized dead-time pairs plus the cycle-end reserve do not fit,
    /// or the duty clamp would cut more than a third of the cycle
    DeadTimeTooLong,
    /// Minimum re-arm delta is not shorter than a cycle
    MinTimerDelta,
    /// Full scale is zero or finer than one timer count
    FullScale,
    /// Startup delay is zero or longer than the counter can arm
    StartupDelay,
}

impl ConfigError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimerFrequency => "timer clock must be a non-zero whole number of MHz",
            Self::PwmFrequency => "PWM frequency must divide the timer clock evenly",
            Self::CycleTooLong => "PWM cycle does not fit the 16-bit counter",
            Self::DeadTime => "dead time must be non-zero",
            Self::DeadTimeTooLong => "dead time too long for the PWM cycle",
            Self::MinTimerDelta => "minimum timer delta must be shorter than a cycle",
            Self::FullScale => "duty full scale must be in 1..=cycle length",
            Self::StartupDelay => "startup delay must be in 1..=0x7FFF counts",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PwmConfig {
    /// Classic 8-bit AVR ESC timing: 16 MHz Timer1, 1 kHz PWM, 2 µs FET switch time,
    /// 20 µs minimum re-arm, 10-bit duty.
    pub const DEFAULT: Self = Self {
        timer_freq_khz: 16_000,
        pwm_freq_hz: 1_000,
        dead_time_us: 2,
        min_timer_delta_us: 20,
        duty_full_scale: 1023,
        startup_delay_counts: 0x7FFF,
    }
    .validated();

    /// Timer counts per microsecond
    pub const fn counts_per_us(&self) -> u32 {
        self.timer_freq_khz / 1000
    }

    /// Timer counts in one PWM cycle
    pub const fn cycle_counts(&self) -> u16 {
        ((self.timer_freq_khz as u64 * 1000) / self.pwm_freq_hz as u64) as u16
    }

    pub const fn dead_time_counts(&self) -> u16 {
        (self.dead_time_us as u32 * self.counts_per_us()) as u16
    }

    pub const fn min_delta_counts(&self) -> u16 {
        (self.min_timer_delta_us as u32 * self.counts_per_us()) as u16
    }

    /// Latest planned time for an OFF command: leaves one dead time for the
    /// paired LOW command and one before ALLOFF.
    pub const fn max_off_counts(&self) -> u16 {
        self.cycle_counts() - 2 * self.dead_time_counts() - 1
    }

    /// Latest time for a LOW command, one count before ALLOFF's dead time begins.
    pub const fn max_low_counts(&self) -> u16 {
        self.cycle_counts() - self.dead_time_counts() - 1
    }

    /// Time of the ALLOFF command within the cycle
    pub const fn all_off_counts(&self) -> u16 {
        self.cycle_counts() - self.dead_time_counts()
    }

    /// Converts a duty value into high-side on time, in counts
    pub const fn on_counts(&self, duty: u16) -> u16 {
        let duty = if duty > self.duty_full_scale {
            self.duty_full_scale
        } else {
            duty
        };
        ((duty as u32 * self.cycle_counts() as u32) / self.duty_full_scale as u32) as u16
    }

    pub const fn check(&self) -> Result<(), ConfigError> {
        if self.timer_freq_khz == 0 || self.timer_freq_khz % 1000 != 0 {
            return Err(ConfigError::TimerFrequency);
        }
        let timer_hz = self.timer_freq_khz as u64 * 1000;
        if self.pwm_freq_hz == 0 || timer_hz % self.pwm_freq_hz as u64 != 0 {
            return Err(ConfigError::PwmFrequency);
        }
        let cycle = timer_hz / self.pwm_freq_hz as u64;
        if cycle > MAX_DELTA_COUNTS as u64 {
            return Err(ConfigError::CycleTooLong);
        }
        let cycle = cycle as u32;
        let dead = self.dead_time_us as u32 * self.counts_per_us();
        if dead == 0 {
            return Err(ConfigError::DeadTime);
        }
        // Room for three serialized OFF/LOW pairs ahead of the ALLOFF reserve,
        // and the clamp may only shave the top third off the duty range.
        if 4 * dead + 1 >= cycle || 3 * (cycle - 2 * dead - 1) < 2 * cycle {
            return Err(ConfigError::DeadTimeTooLong);
        }
        let min_delta = self.min_timer_delta_us as u32 * self.counts_per_us();
        if min_delta >= cycle {
            return Err(ConfigError::MinTimerDelta);
        }
        if self.duty_full_scale == 0 || self.duty_full_scale as u32 > cycle {
            return Err(ConfigError::FullScale);
        }
        if self.startup_delay_counts == 0 || self.startup_delay_counts as u32 > MAX_DELTA_COUNTS {
            return Err(ConfigError::StartupDelay);
        }
        Ok(())
    }

    /// Returns `self` if consistent. Panics otherwise, which is a compile error
    /// when evaluated in a `const` item.
    pub const fn validated(self) -> Self {
        match self.check() {
            Ok(()) => self,
            Err(e) => panic!("{}", e.as_str()),
        }
    }
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CFG_8000: PwmConfig = PwmConfig {
        timer_freq_khz: 16_000,
        pwm_freq_hz: 2_000,
        dead_time_us: 2,
        min_timer_delta_us: 20,
        duty_full_scale: 1000,
        startup_delay_counts: 1000,
    }
    .validated();

    #[test]
    fn test_default_counts() {
        let cfg = PwmConfig::DEFAULT;
        assert_eq!(cfg.cycle_counts(), 16_000);
        assert_eq!(cfg.dead_time_counts(), 32);
        assert_eq!(cfg.min_delta_counts(), 320);
        assert_eq!(cfg.all_off_counts(), 15_968);
    }

    #[test]
    fn test_clamp_limits() {
        assert_eq!(CFG_8000.cycle_counts(), 8000);
        assert_eq!(CFG_8000.max_off_counts(), 7935);
        assert_eq!(CFG_8000.max_low_counts(), 7967);
        assert_eq!(CFG_8000.all_off_counts(), 7968);
    }

    #[test]
    fn test_on_counts_scales_and_saturates() {
        assert_eq!(CFG_8000.on_counts(0), 0);
        assert_eq!(CFG_8000.on_counts(500), 4000);
        assert_eq!(CFG_8000.on_counts(1000), 8000);
        assert_eq!(CFG_8000.on_counts(4000), 8000);
    }

    #[test]
    fn test_rejects_inconsistent_configs() {
        let base = CFG_8000;

        let cfg = PwmConfig { timer_freq_khz: 16_500, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::TimerFrequency));

        let cfg = PwmConfig { pwm_freq_hz: 3_000, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::PwmFrequency));

        let cfg = PwmConfig { pwm_freq_hz: 250, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::CycleTooLong));

        let cfg = PwmConfig { dead_time_us: 0, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::DeadTime));

        let cfg = PwmConfig { dead_time_us: 100, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::DeadTimeTooLong));

        let cfg = PwmConfig { min_timer_delta_us: 500, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::MinTimerDelta));

        let cfg = PwmConfig { duty_full_scale: 0, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::FullScale));

        let cfg = PwmConfig { startup_delay_counts: 0x8000, ..base };
        assert_eq!(cfg.check(), Err(ConfigError::StartupDelay));
    }

    #[test]
    #[should_panic(expected = "dead time must be non-zero")]
    fn test_validated_panics_on_bad_config() {
        let _ = PwmConfig { dead_time_us: 0, ..CFG_8000 }.validated();
    }
}
