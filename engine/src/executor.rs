//! Interrupt-side table walker.
//!
//! Lives in the compare-match interrupt. Each call applies the entry the timer
//! just fired for and arms the next one. Entries marked `wait_in_isr` are too
//! close to leave the handler, so they are busy-waited in place.

use crate::command::{Command, Phase};
use crate::engine::Commutation;
use crate::fet::FetDriver;
use crate::schedule::{TABLE_LEN, Table};
use crate::timer::CompareTimer;

pub struct Executor<'a, F, T> {
    shared: &'a Commutation,
    fets: F,
    timer: T,
    /// Buffer index being walked
    running: usize,
    cursor: usize,
    /// Counter value the pending compare was armed for
    deadline: u16,
}

impl<'a, F: FetDriver, T: CompareTimer> Executor<'a, F, T> {
    pub(crate) fn new(shared: &'a Commutation, fets: F, timer: T) -> Self {
        Self {
            shared,
            fets,
            timer,
            running: shared.adopt(),
            cursor: 0,
            deadline: 0,
        }
    }

    /// Switches every FET off and schedules the first entry of the newest
    /// published table.
    ///
    /// After a fault stop the faulty table is run again unless a good one was
    /// published first.
    pub fn start(&mut self) {
        self.fets.all_off();
        self.running = self.shared.adopt();
        self.cursor = 0;
        let delay = self
            .shared
            .entry(self.running, 0)
            .map_or(self.shared.config().startup_delay_counts, |e| e.delta());
        self.deadline = self.timer.now().wrapping_add(delay);
        self.timer.clear_pending();
        self.timer.arm(self.deadline);
        self.shared.set_enabled(true);
        info!("commutation started, first compare in {} counts", delay);
    }

    /// Disables the handler and switches every FET off. A pending table is
    /// taken over so the port can publish again right away.
    pub fn stop(&mut self) {
        self.shared.set_enabled(false);
        self.fets.all_off();
        self.running = self.shared.adopt();
        self.cursor = 0;
        info!("commutation stopped");
    }

    /// Compare-match handler
    pub fn on_compare(&mut self) {
        if !self.shared.is_enabled() {
            return;
        }
        loop {
            let Some(entry) = self.shared.entry(self.running, self.cursor) else {
                return self.halt_overrun();
            };
            let Some(command) = entry.command() else {
                return self.halt_corrupt(entry.raw_command());
            };
            self.apply(command);

            let fired_at = self.deadline;
            let Some(next) = self.shared.entry(self.running, self.cursor) else {
                return self.halt_overrun();
            };
            self.deadline = fired_at.wrapping_add(next.delta());
            self.timer.clear_pending();
            self.timer.arm(self.deadline);
            if !next.wait_in_isr() {
                return;
            }
            while self.timer.now().wrapping_sub(fired_at) < next.delta() {
                core::hint::spin_loop();
            }
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Start => self.fets.all_high_on(),
            Command::OffA => self.fets.set_high(Phase::A, false),
            Command::LowA => self.fets.set_low(Phase::A, true),
            Command::OffB => self.fets.set_high(Phase::B, false),
            Command::LowB => self.fets.set_low(Phase::B, true),
            Command::OffC => self.fets.set_high(Phase::C, false),
            Command::LowC => self.fets.set_low(Phase::C, true),
            Command::AllOff => {
                self.fets.all_low_off();
                let next = self.shared.take_swap(self.running);
                if next != self.running {
                    trace!("switched to table {}", next);
                }
                self.running = next;
                self.cursor = 0;
                return;
            }
        }
        self.cursor += 1;
    }

    fn halt_corrupt(&mut self, raw: u8) {
        self.shared.set_enabled(false);
        error!(
            "corrupt command {} at entry {} of table {}, commutation halted",
            raw, self.cursor, self.running
        );
    }

    fn halt_overrun(&mut self) {
        self.shared.set_enabled(false);
        error!(
            "table {} has no ALLOFF within {} entries, commutation halted",
            self.running, TABLE_LEN
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }

    /// Copy of the table currently being walked
    pub fn running_table(&self) -> Table {
        self.shared.table(self.running)
    }

    /// Index of the entry the pending compare will apply
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn fets(&self) -> &F {
        &self.fets
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
