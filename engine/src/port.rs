//! Foreground side: duty cycles in, commutation tables out.

use crate::command::Phase;
use crate::config::PwmConfig;
use crate::engine::Commutation;
use crate::schedule::{self, Table};

/// Holds the requested duty cycles and publishes tables built from them.
///
/// A table can only be published once the executor has picked up the previous
/// one (at its next ALLOFF). Until then [`update`](Self::update) leaves the
/// request outstanding, and [`tickle`](Self::tickle) should be called
/// periodically to retry it.
pub struct DutyPort<'a> {
    shared: &'a Commutation,
    duties: [u16; 3],
    outstanding: bool,
}

impl<'a> DutyPort<'a> {
    pub(crate) fn new(shared: &'a Commutation) -> Self {
        Self {
            shared,
            duties: [0; 3],
            outstanding: false,
        }
    }

    pub fn config(&self) -> &PwmConfig {
        self.shared.config()
    }

    /// Sets the duty of one phase, clamped to full scale. Takes effect on the
    /// next [`update`](Self::update).
    pub fn set_pwm(&mut self, phase: Phase, value: u16) {
        self.duties[phase.index()] = value.min(self.config().duty_full_scale);
    }

    pub fn duty(&self, phase: Phase) -> u16 {
        self.duties[phase.index()]
    }

    pub fn duties(&self) -> [u16; 3] {
        self.duties
    }

    /// Requests a new table from the current duties. Returns `true` if it was
    /// published now, `false` if it is left for [`tickle`](Self::tickle).
    pub fn update(&mut self) -> bool {
        self.outstanding = true;
        self.try_publish()
    }

    /// Retries an outstanding update. Returns `true` if a table was published.
    pub fn tickle(&mut self) -> bool {
        self.outstanding && self.try_publish()
    }

    /// A published table has not been picked up by the executor yet
    pub fn busy(&self) -> bool {
        self.shared.is_pending()
    }

    pub fn is_update_outstanding(&self) -> bool {
        self.outstanding
    }

    /// Gate the compare handler. Disabling leaves the outputs as they are;
    /// [`Executor::start`](crate::Executor::start) re-enables from a clean state.
    pub fn isr_enable(&self, enabled: bool) {
        self.shared.set_enabled(enabled);
        debug!("commutation isr {}", if enabled { "enabled" } else { "disabled" });
    }

    /// `false` after [`isr_enable(false)`](Self::isr_enable) or a fault stop
    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }

    /// Publishes a prebuilt table as is. Returns `false` while busy.
    ///
    /// The table is not checked; run [`Table::check`] first if it did not come
    /// from [`schedule::build`].
    pub fn publish_table(&mut self, table: &Table) -> bool {
        self.shared.publish(table)
    }

    fn try_publish(&mut self) -> bool {
        if self.busy() {
            trace!("swap pending, update deferred");
            return false;
        }

        let (table, _plan) = schedule::build(self.config(), self.duties);

        if cfg!(debug_assertions) {
            if let Err(e) = table.check(self.config()) {
                error!("built table rejected: {}", e);
                return false;
            }
        }

        if !self.shared.publish(&table) {
            return false;
        }
        self.outstanding = false;
        trace!(
            "published duties {} {} {}",
            self.duties[0], self.duties[1], self.duties[2]
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::fet::FetDriver;
    use crate::testing::{MockTimer, rig};

    const CFG: PwmConfig = PwmConfig {
        timer_freq_khz: 16_000,
        pwm_freq_hz: 2_000,
        dead_time_us: 2,
        min_timer_delta_us: 20,
        duty_full_scale: 1000,
        startup_delay_counts: 1000,
    }
    .validated();

    fn fire<F: FetDriver>(exec: &mut Executor<'_, F, MockTimer>) {
        exec.timer_mut().fire();
        exec.on_compare();
    }

    #[test]
    fn test_set_pwm_clamps_to_full_scale() {
        let mut engine = Commutation::new(CFG);
        let (fets, timer) = rig(0);
        let (mut port, _exec) = engine.split(fets, timer);

        port.set_pwm(Phase::A, 250);
        port.set_pwm(Phase::B, 1000);
        port.set_pwm(Phase::C, 5000);
        assert_eq!(port.duties(), [250, 1000, 1000]);
        assert!(!port.is_update_outstanding());
    }

    #[test]
    fn test_tickle_without_request_does_nothing() {
        let mut engine = Commutation::new(CFG);
        let (fets, timer) = rig(0);
        let (mut port, _exec) = engine.split(fets, timer);

        assert!(!port.tickle());
        assert!(!port.busy());
    }

    #[test]
    fn test_update_while_busy_is_deferred_to_tickle() {
        let mut engine = Commutation::new(CFG);
        let (fets, timer) = rig(0);
        let (mut port, mut exec) = engine.split(fets, timer);
        exec.start();

        port.set_pwm(Phase::A, 100);
        port.set_pwm(Phase::B, 100);
        port.set_pwm(Phase::C, 100);
        assert!(port.update());
        assert!(port.busy());
        assert!(!port.is_update_outstanding());

        port.set_pwm(Phase::A, 900);
        assert!(!port.update());
        assert!(port.busy());
        assert!(port.is_update_outstanding());
        assert!(!port.tickle());

        // Idle ALLOFF swaps in the first table
        fire(&mut exec);
        assert!(!port.busy());
        assert_eq!(exec.running_table(), schedule::build(&CFG, [100, 100, 100]).0);

        assert!(port.tickle());
        assert!(port.busy());
        assert!(!port.is_update_outstanding());
        assert!(!port.tickle());

        // The first table runs out its cycle, then the second takes over
        while port.busy() {
            fire(&mut exec);
        }
        assert_eq!(exec.running_table(), schedule::build(&CFG, [900, 100, 100]).0);
        assert!(!exec.fets().shoot_through());
    }

    #[test]
    fn test_latest_duties_win() {
        let mut engine = Commutation::new(CFG);
        let (fets, timer) = rig(0);
        let (mut port, mut exec) = engine.split(fets, timer);
        exec.start();

        assert!(port.update());
        for duty in [100, 200, 300] {
            port.set_pwm(Phase::B, duty);
            assert!(!port.update());
        }
        fire(&mut exec);
        assert!(port.tickle());
        while port.busy() {
            fire(&mut exec);
        }
        assert_eq!(exec.running_table(), schedule::build(&CFG, [0, 300, 0]).0);
    }

    #[test]
    fn test_isr_enable_gates_executor() {
        let mut engine = Commutation::new(CFG);
        let (fets, timer) = rig(0);
        let (port, mut exec) = engine.split(fets, timer);
        assert!(!port.is_enabled());

        exec.start();
        assert!(port.is_enabled());
        port.isr_enable(false);
        assert!(!exec.is_enabled());
        port.isr_enable(true);
        assert!(exec.is_enabled());
    }
}
