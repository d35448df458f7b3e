//! Commutation tables and the builder that turns three duty cycles into one.
//!
//! A [`Table`] describes one PWM cycle as eight timed commands. Each entry
//! holds the delay since the previous entry, so the executor can run it
//! against a free-running counter:
//!
//! ```text
//!  ALLOFF ..dt.. START ....... OFFx ..dt.. LOWx ... OFFy ..dt.. LOWy ... ALLOFF
//! ```
//!
//! The builder also returns the [`Plan`] it derived the table from: the
//! absolute time each command was requested at, counted from START.

use core::fmt;

use crate::command::{Command, Phase};
use crate::config::PwmConfig;

/// Entries in one commutation table
pub const TABLE_LEN: usize = 8;

/// One timed command of a commutation table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct ScheduleEntry {
    command: u8,
    wait_in_isr: bool,
    delta: u16,
}

impl ScheduleEntry {
    pub const fn new(command: Command, delta: u16, wait_in_isr: bool) -> Self {
        Self::from_raw(command as u8, delta, wait_in_isr)
    }

    /// Builds an entry from a raw command byte, valid or not
    pub const fn from_raw(command: u8, delta: u16, wait_in_isr: bool) -> Self {
        Self {
            command,
            wait_in_isr,
            delta,
        }
    }

    /// Decoded command, `None` if the byte is corrupt
    pub fn command(&self) -> Option<Command> {
        Command::from_raw(self.command)
    }

    pub fn raw_command(&self) -> u8 {
        self.command
    }

    /// Counts between the previous entry and this one
    pub fn delta(&self) -> u16 {
        self.delta
    }

    /// True when `delta` is too short to leave the interrupt and re-enter it
    pub fn wait_in_isr(&self) -> bool {
        self.wait_in_isr
    }
}

/// A command and the time it is planned for, counted from START
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slot {
    pub command: Command,
    pub at: u16,
}

impl Slot {
    const fn new(command: Command, at: u16) -> Self {
        Self { command, at }
    }
}

/// Requested command times in table order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Plan {
    slots: [Slot; TABLE_LEN],
}

impl Plan {
    pub fn slots(&self) -> &[Slot; TABLE_LEN] {
        &self.slots
    }

    /// Planned time of `command`
    pub fn at(&self, command: Command) -> Option<u16> {
        self.slots
            .iter()
            .find(|slot| slot.command == command)
            .map(|slot| slot.at)
    }
}

/// One PWM cycle worth of commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Table {
    entries: [ScheduleEntry; TABLE_LEN],
}

impl Table {
    /// A table that only ever switches everything off, once every `delay` counts.
    ///
    /// Used until the first real table is published.
    pub const fn idle(delay: u16) -> Self {
        Self {
            entries: [ScheduleEntry::new(Command::AllOff, delay, false); TABLE_LEN],
        }
    }

    pub const fn from_entries(entries: [ScheduleEntry; TABLE_LEN]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ScheduleEntry; TABLE_LEN] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<ScheduleEntry> {
        self.entries.get(index).copied()
    }

    /// Length of the cycle this table describes, START's lead-in included
    pub fn total_counts(&self) -> u32 {
        self.entries.iter().map(|e| e.delta as u32).sum()
    }

    /// Time each entry fires at, counted from START
    pub fn timestamps(&self) -> [u32; TABLE_LEN] {
        let mut out = [0u32; TABLE_LEN];
        for i in 1..TABLE_LEN {
            out[i] = out[i - 1] + self.entries[i].delta as u32;
        }
        out
    }

    /// Sanity check of a table before handing it to the executor.
    ///
    /// START first, ALLOFF last, each phase's OFF immediately followed by its
    /// LOW no sooner than one dead time later, urgency flags matching the
    /// deltas, and a total between two thirds of a cycle and a full cycle.
    pub fn check(&self, config: &PwmConfig) -> Result<(), TableError> {
        let dead = config.dead_time_counts();
        let min_delta = config.min_delta_counts();

        let mut commands = [Command::Start; TABLE_LEN];
        for (i, entry) in self.entries.iter().enumerate() {
            commands[i] = entry
                .command()
                .ok_or(TableError::CorruptCommand { index: i as u8 })?;
            if entry.wait_in_isr != (entry.delta < min_delta) {
                return Err(TableError::UrgencyMismatch { index: i as u8 });
            }
        }

        if commands[0] != Command::Start {
            return Err(TableError::FirstNotStart);
        }
        if self.entries[0].delta < dead {
            return Err(TableError::DeadTimeViolation { index: 0 });
        }
        if commands[TABLE_LEN - 1] != Command::AllOff {
            return Err(TableError::LastNotAllOff);
        }

        let mut seen = [false; 3];
        for i in (1..TABLE_LEN - 1).step_by(2) {
            let Some(phase) = commands[i].phase().filter(|_| commands[i].is_off()) else {
                return Err(TableError::UnpairedOff { index: i as u8 });
            };
            if commands[i + 1] != Command::low(phase) {
                return Err(TableError::UnpairedOff { index: i as u8 });
            }
            if core::mem::replace(&mut seen[phase.index()], true) {
                return Err(TableError::DuplicatePhase { index: i as u8 });
            }
            if self.entries[i + 1].delta < dead {
                return Err(TableError::DeadTimeViolation {
                    index: (i + 1) as u8,
                });
            }
        }

        let total = self.total_counts();
        let cycle = config.cycle_counts() as u32;
        if total > cycle || 3 * total < 2 * cycle {
            return Err(TableError::TotalTime { total });
        }
        Ok(())
    }
}

/// Why [`Table::check`] rejected a table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    CorruptCommand { index: u8 },
    FirstNotStart,
    LastNotAllOff,
    /// An OFF command is missing or not followed by its own LOW
    UnpairedOff { index: u8 },
    DuplicatePhase { index: u8 },
    /// A LOW command, or START, comes less than one dead time after its predecessor
    DeadTimeViolation { index: u8 },
    UrgencyMismatch { index: u8 },
    TotalTime { total: u32 },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptCommand { index } => write!(f, "corrupt command at entry {index}"),
            Self::FirstNotStart => f.write_str("first entry is not START"),
            Self::LastNotAllOff => f.write_str("last entry is not ALLOFF"),
            Self::UnpairedOff { index } => write!(f, "OFF/LOW pair broken at entry {index}"),
            Self::DuplicatePhase { index } => write!(f, "phase repeated at entry {index}"),
            Self::DeadTimeViolation { index } => write!(f, "dead time too short at entry {index}"),
            Self::UrgencyMismatch { index } => write!(f, "wait flag wrong at entry {index}"),
            Self::TotalTime { total } => write!(f, "cycle total {total} out of range"),
        }
    }
}

/// Builds the commutation table for one set of duty cycles, indexed by [`Phase`].
///
/// Each phase's OFF time is its on time clamped to
/// [`PwmConfig::max_off_counts`], and its LOW follows one dead time later.
/// The three OFF/LOW pairs are stable-sorted by OFF time as units, so every OFF
/// stays directly in front of its LOW. When pairs are closer than a dead time
/// they are serialized: a pair fires no earlier than its predecessor's LOW,
/// and the run is pulled forward if that would crowd ALLOFF. The returned
/// [`Plan`] keeps the requested times.
pub fn build(config: &PwmConfig, duties: [u16; 3]) -> (Table, Plan) {
    let dead = config.dead_time_counts();
    let min_delta = config.min_delta_counts();

    let mut off_at = [0u16; 3];
    for phase in Phase::ALL {
        off_at[phase.index()] = config
            .on_counts(duties[phase.index()])
            .min(config.max_off_counts());
    }

    // Insertion sort, strict comparison keeps A, B, C order on ties
    let mut order = Phase::ALL;
    for i in 1..order.len() {
        let mut j = i;
        while j > 0 && off_at[order[j - 1].index()] > off_at[order[j].index()] {
            order.swap(j - 1, j);
            j -= 1;
        }
    }

    let mut slots = [Slot::new(Command::Start, 0); TABLE_LEN];
    for (k, phase) in order.iter().enumerate() {
        let at = off_at[phase.index()];
        slots[1 + 2 * k] = Slot::new(Command::off(*phase), at);
        slots[2 + 2 * k] = Slot::new(Command::low(*phase), at + dead);
    }
    slots[TABLE_LEN - 1] = Slot::new(Command::AllOff, config.all_off_counts());

    // Realized OFF times: push overlapping pairs back, then pull the tail in
    let mut fire_at = [0u16; 3];
    for k in 0..fire_at.len() {
        let earliest = if k == 0 { 0 } else { fire_at[k - 1] + dead };
        fire_at[k] = slots[1 + 2 * k].at.max(earliest);
    }
    let mut latest = config.max_off_counts();
    for k in (0..fire_at.len()).rev() {
        fire_at[k] = fire_at[k].min(latest);
        latest = fire_at[k].saturating_sub(dead);
    }

    let mut entries = [ScheduleEntry::new(Command::Start, 0, false); TABLE_LEN];
    let mut elapsed = 0u16;
    for (i, slot) in slots.iter().enumerate() {
        let at = match i {
            0 => 0,
            i if i == TABLE_LEN - 1 => slot.at,
            i if i % 2 == 1 => fire_at[(i - 1) / 2],
            _ => elapsed + dead,
        };
        let delta = at - elapsed;
        entries[i] = ScheduleEntry::new(slot.command, delta, delta < min_delta);
        elapsed = at;
    }

    // START is reached from the previous cycle's ALLOFF, one dead time earlier
    entries[0] = ScheduleEntry::new(Command::Start, dead, dead < min_delta);

    (Table { entries }, Plan { slots })
}
