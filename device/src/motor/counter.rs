//! TIM3 as the free-running commutation counter, CC1 as the compare channel

use embassy_stm32::Peri;
use embassy_stm32::pac;
use embassy_stm32::peripherals::TIM3;
use embassy_stm32::timer::low_level::Timer;
use tripolar_engine::{CompareTimer, PwmConfig};

/// Up-counting 16-bit TIM3, wrapping at 0xFFFF, ticking at the configured
/// timer frequency. Only CC1's interrupt is enabled; NVIC unmasking is left to
/// the caller once the executor is installed.
pub struct CounterTimer<'d> {
    // Keeps the peripheral clock enabled
    _tim: Timer<'d, TIM3>,
}

impl<'d> CounterTimer<'d> {
    pub fn new(tim3: Peri<'d, TIM3>, config: &PwmConfig) -> Self {
        let tim = Timer::new(tim3);
        let clock = tim.get_clock_frequency().0;
        let tick = config.timer_freq_khz * 1000;
        let psc = (clock / tick).saturating_sub(1) as u16;

        let regs = pac::TIM3;
        regs.cr1().modify(|w| w.set_cen(false));
        regs.psc().write_value(psc);
        regs.arr().write(|w| w.set_arr(u16::MAX));
        // Latch the prescaler now rather than at the first overflow
        regs.egr().write(|w| w.set_ug(true));
        regs.sr().write(|w| w.set_uif(false));
        regs.dier().modify(|w| w.set_ccie(0, true));
        regs.cr1().modify(|w| w.set_cen(true));

        if clock % tick != 0 {
            defmt::warn!("TIM3: {}Hz is not a multiple of the {}Hz tick", clock, tick);
        }
        defmt::info!("TIM3 counter: clock={}Hz, psc={}, tick={}Hz", clock, psc, tick);

        Self { _tim: tim }
    }
}

impl CompareTimer for CounterTimer<'_> {
    #[inline(always)]
    fn now(&self) -> u16 {
        pac::TIM3.cnt().read().cnt()
    }

    #[inline(always)]
    fn arm(&mut self, at: u16) {
        pac::TIM3.ccr(0).write(|w| w.set_ccr(at));
    }

    #[inline(always)]
    fn clear_pending(&mut self) {
        pac::TIM3.sr().write(|w| w.set_ccif(0, false));
    }
}
