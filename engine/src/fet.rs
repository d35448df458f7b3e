//! Power stage abstraction: six gate outputs, two per phase.

use crate::command::Phase;

/// Gate outputs of the three half-bridges.
///
/// Every operation must be idempotent. Only the executor (and its start-up)
/// calls these, so implementations need no locking of their own.
pub trait FetDriver {
    /// Switch the high-side FET of `phase`
    fn set_high(&mut self, phase: Phase, on: bool);

    /// Switch the low-side FET of `phase`
    fn set_low(&mut self, phase: Phase, on: bool);

    fn all_high_on(&mut self) {
        for phase in Phase::ALL {
            self.set_high(phase, true);
        }
    }

    fn all_low_off(&mut self) {
        for phase in Phase::ALL {
            self.set_low(phase, false);
        }
    }

    /// Every gate off, high sides first
    fn all_off(&mut self) {
        for phase in Phase::ALL {
            self.set_high(phase, false);
        }
        self.all_low_off();
    }
}

impl<T: FetDriver + ?Sized> FetDriver for &mut T {
    fn set_high(&mut self, phase: Phase, on: bool) {
        (**self).set_high(phase, on);
    }

    fn set_low(&mut self, phase: Phase, on: bool) {
        (**self).set_low(phase, on);
    }
}
