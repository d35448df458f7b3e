//! Gate outputs of the B-G431B-ESC1 power stage as plain GPIO

use embassy_stm32::Peri;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::peripherals::{PA8, PA9, PA10, PA12, PB15, PC13};
use tripolar_engine::{FetDriver, Phase};

/// The six gate lines, driven directly by the commutation executor.
///
/// On this board they are TIM1's CHx/CHxN pins, here taken over as outputs.
pub struct GateDriver<'d> {
    high: [Output<'d>; 3],
    low: [Output<'d>; 3],
}

impl<'d> GateDriver<'d> {
    /// All gates start low
    pub fn new(
        pa8: Peri<'d, PA8>,
        pc13: Peri<'d, PC13>,
        pa9: Peri<'d, PA9>,
        pa12: Peri<'d, PA12>,
        pa10: Peri<'d, PA10>,
        pb15: Peri<'d, PB15>,
    ) -> Self {
        Self {
            high: [
                Output::new(pa8, Level::Low, Speed::VeryHigh),  // Phase A high
                Output::new(pa9, Level::Low, Speed::VeryHigh),  // Phase B high
                Output::new(pa10, Level::Low, Speed::VeryHigh), // Phase C high
            ],
            low: [
                Output::new(pc13, Level::Low, Speed::VeryHigh), // Phase A low
                Output::new(pa12, Level::Low, Speed::VeryHigh), // Phase B low
                Output::new(pb15, Level::Low, Speed::VeryHigh), // Phase C low
            ],
        }
    }
}

impl FetDriver for GateDriver<'_> {
    #[inline(always)]
    fn set_high(&mut self, phase: Phase, on: bool) {
        self.high[phase.index()].set_level(Level::from(on));
    }

    #[inline(always)]
    fn set_low(&mut self, phase: Phase, on: bool) {
        self.low[phase.index()].set_level(Level::from(on));
    }
}
