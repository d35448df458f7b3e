//! State shared between the duty-cycle port and the interrupt-side executor.

use core::cell::{Cell, UnsafeCell};
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::config::PwmConfig;
use crate::executor::Executor;
use crate::fet::FetDriver;
use crate::port::DutyPort;
use crate::schedule::{ScheduleEntry, Table};
use crate::timer::CompareTimer;

/// Which buffer is current, and whether the executor still has to pick it up.
///
/// While `pending` is clear, `selected` is the table the executor runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SwapState {
    selected: u8,
    pending: bool,
}

/// Double-buffered commutation tables plus the swap handshake.
///
/// Create one per power stage, typically in a `StaticCell`, and [`split`] it
/// into the single [`DutyPort`] and single [`Executor`] that may touch it.
///
/// [`split`]: Commutation::split
pub struct Commutation {
    config: PwmConfig,
    tables: [UnsafeCell<Table>; 2],
    swap: Mutex<CriticalSectionRawMutex, Cell<SwapState>>,
    enabled: AtomicBool,
}

// SAFETY: `split` hands out exactly one writer (the port) and one reader (the
// executor). The writer only touches the buffer that is neither running nor
// pending, and the swap state that decides which one that is lives behind a
// critical section. Every executor, including one from a later `split`,
// starts on the selected buffer.
unsafe impl Sync for Commutation {}

impl Commutation {
    /// Both buffers start as the idle table, executor disabled.
    pub const fn new(config: PwmConfig) -> Self {
        let idle = Table::idle(config.startup_delay_counts);
        Self {
            config,
            tables: [UnsafeCell::new(idle), UnsafeCell::new(idle)],
            swap: Mutex::new(Cell::new(SwapState {
                selected: 0,
                pending: false,
            })),
            enabled: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PwmConfig {
        &self.config
    }

    /// Splits into the foreground port and the interrupt-side executor
    pub fn split<F: FetDriver, T: CompareTimer>(
        &mut self,
        fets: F,
        timer: T,
    ) -> (DutyPort<'_>, Executor<'_, F, T>) {
        let shared: &Self = self;
        (DutyPort::new(shared), Executor::new(shared, fets, timer))
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.swap.lock(|s| s.get().pending)
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Copies `table` into the idle buffer and flags it for the executor.
    ///
    /// Returns `false` without writing anything while a previous table is
    /// still waiting to be picked up.
    pub(crate) fn publish(&self, table: &Table) -> bool {
        let state = self.swap.lock(|s| s.get());
        if state.pending {
            return false;
        }
        let idle = 1 - state.selected as usize;

        // SAFETY: with nothing pending the executor runs `selected` and never
        // reads `idle` until `pending` is raised below. Only the one port
        // calls this.
        unsafe { *self.tables[idle].get() = *table };

        self.swap.lock(|s| {
            s.set(SwapState {
                selected: idle as u8,
                pending: true,
            })
        });
        true
    }

    /// Called by the executor at ALLOFF. Returns the buffer to run next and
    /// clears the pending flag if it switched.
    pub(crate) fn take_swap(&self, running: usize) -> usize {
        self.swap.lock(|s| {
            let state = s.get();
            if state.pending {
                s.set(SwapState {
                    pending: false,
                    ..state
                });
                state.selected as usize
            } else {
                running
            }
        })
    }

    /// Moves an executor that is not walking a table onto the newest one,
    /// whatever buffer it last ran. Clears the pending flag.
    pub(crate) fn adopt(&self) -> usize {
        self.swap.lock(|s| {
            let state = s.get();
            s.set(SwapState {
                pending: false,
                ..state
            });
            state.selected as usize
        })
    }

    pub(crate) fn entry(&self, table: usize, index: usize) -> Option<ScheduleEntry> {
        // SAFETY: the executor only reads the buffer it is running, which the
        // port does not write until a later swap releases it.
        unsafe { (*self.tables[table].get()).get(index) }
    }

    pub(crate) fn table(&self, table: usize) -> Table {
        // SAFETY: as for `entry`
        unsafe { *self.tables[table].get() }
    }
}
