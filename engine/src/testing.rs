//! Host-side stand-ins for the gate outputs and the compare timer.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::command::Phase;
use crate::fet::FetDriver;
use crate::timer::CompareTimer;

/// Simulated 16-bit counter.
///
/// Time only moves while someone polls [`CompareTimer::now`] and stops at the
/// armed compare value, so a busy-wait ends exactly on its deadline.
/// [`MockTimer::fire`] jumps straight to the compare, as the interrupt would.
pub struct MockTimer {
    clock: Rc<Cell<u16>>,
    armed: Option<u16>,
    polls: Cell<u32>,
}

impl MockTimer {
    pub fn at(start: u16) -> Self {
        Self {
            clock: Rc::new(Cell::new(start)),
            armed: None,
            polls: Cell::new(0),
        }
    }

    pub fn armed(&self) -> Option<u16> {
        self.armed
    }

    pub fn polls(&self) -> u32 {
        self.polls.get()
    }

    /// Advance the counter to the armed compare value
    pub fn fire(&mut self) {
        if let Some(at) = self.armed {
            self.clock.set(at);
        }
    }
}

impl CompareTimer for MockTimer {
    fn now(&self) -> u16 {
        self.polls.set(self.polls.get() + 1);
        let now = self.clock.get();
        match self.armed {
            Some(at) if (at.wrapping_sub(now) as i16) > 0 => {
                self.clock.set(now.wrapping_add(1));
                now.wrapping_add(1)
            }
            _ => now,
        }
    }

    fn arm(&mut self, at: u16) {
        self.armed = Some(at);
    }

    fn clear_pending(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetEvent {
    High(Phase, bool),
    Low(Phase, bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    pub at: u16,
    pub event: FetEvent,
}

/// Records every gate change with the simulated counter value, and latches
/// if a high side and its low side were ever on together.
pub struct FetModel {
    clock: Rc<Cell<u16>>,
    high: [bool; 3],
    low: [bool; 3],
    log: RefCell<Vec<Record>>,
    shoot_through: bool,
}

impl FetModel {
    pub fn events(&self) -> Vec<Record> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn shoot_through(&self) -> bool {
        self.shoot_through
    }

    pub fn is_all_off(&self) -> bool {
        self.high.iter().chain(self.low.iter()).all(|on| !on)
    }

    fn record(&mut self, event: FetEvent) {
        self.log.borrow_mut().push(Record {
            at: self.clock.get(),
            event,
        });
    }

    fn check(&mut self, phase: Phase) {
        if self.high[phase.index()] && self.low[phase.index()] {
            self.shoot_through = true;
        }
    }
}

impl FetDriver for FetModel {
    fn set_high(&mut self, phase: Phase, on: bool) {
        self.record(FetEvent::High(phase, on));
        self.high[phase.index()] = on;
        self.check(phase);
    }

    fn set_low(&mut self, phase: Phase, on: bool) {
        self.record(FetEvent::Low(phase, on));
        self.low[phase.index()] = on;
        self.check(phase);
    }
}

/// Gate model and timer sharing one simulated counter starting at `start`
pub fn rig(start: u16) -> (FetModel, MockTimer) {
    let timer = MockTimer::at(start);
    let fets = FetModel {
        clock: timer.clock.clone(),
        high: [false; 3],
        low: [false; 3],
        log: RefCell::new(Vec::new()),
        shoot_through: false,
    };
    (fets, timer)
}
