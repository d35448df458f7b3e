//! Free-running counter with a single compare channel.

/// The time base the executor runs against.
///
/// The counter is 16 bits wide and wraps; the executor only ever compares
/// wrapped differences, so deltas must stay below half the counter range.
pub trait CompareTimer {
    /// Current counter value
    fn now(&self) -> u16;

    /// Program the compare register to fire when the counter reaches `at`
    fn arm(&mut self, at: u16);

    /// Clear a compare match that is already latched
    fn clear_pending(&mut self);
}

impl<T: CompareTimer + ?Sized> CompareTimer for &mut T {
    fn now(&self) -> u16 {
        (**self).now()
    }

    fn arm(&mut self, at: u16) {
        (**self).arm(at);
    }

    fn clear_pending(&mut self) {
        (**self).clear_pending();
    }
}
