//! Table-driven PWM for three-phase BLDC power stages without a motor-control timer.
//!
//! Every PWM cycle is described by a small table of timed switch commands,
//! built in the foreground from three duty cycles and walked in a single
//! compare-match interrupt against a free-running 16-bit counter:
//!
//! - [`schedule::build`] turns duties into a [`Table`]
//! - [`DutyPort`] owns the duties and publishes tables
//! - [`Executor`] runs in the interrupt and drives a [`FetDriver`]
//!
//! Both halves come from [`Commutation::split`], which double-buffers the
//! tables so a new one is only taken over at a cycle boundary.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod command;
pub mod config;
mod engine;
mod executor;
mod fet;
mod port;
pub mod schedule;
mod timer;

#[cfg(test)]
mod testing;

pub use command::{Command, Phase};
pub use config::{ConfigError, PwmConfig};
pub use engine::Commutation;
pub use executor::Executor;
pub use fet::FetDriver;
pub use port::DutyPort;
pub use schedule::{Plan, ScheduleEntry, Table, TableError};
pub use timer::CompareTimer;
