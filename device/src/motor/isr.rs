//! TIM3 compare interrupt and the commutation executor it runs

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_stm32::{interrupt, pac};
use tripolar_engine::Executor;

use super::counter::CounterTimer;
use super::gates::GateDriver;

pub type BoardExecutor = Executor<'static, GateDriver<'static>, CounterTimer<'static>>;

static EXECUTOR: Mutex<RefCell<Option<BoardExecutor>>> = Mutex::new(RefCell::new(None));

/// Starts the executor and hands it to the TIM3 interrupt
pub fn install(mut executor: BoardExecutor) {
    executor.start();
    critical_section::with(|cs| {
        EXECUTOR.borrow(cs).replace(Some(executor));
    });
    unsafe {
        cortex_m::peripheral::NVIC::unmask(interrupt::TIM3);
    }
    defmt::info!("Commutation ISR installed on TIM3");
}

/// Runs `f` on the installed executor with the interrupt held off
pub fn with_executor<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut BoardExecutor) -> R,
{
    critical_section::with(|cs| EXECUTOR.borrow(cs).borrow_mut().as_mut().map(f))
}

#[interrupt]
fn TIM3() {
    // A disabled executor does not touch the timer, clear here so it cannot retrigger
    pac::TIM3.sr().write(|w| w.set_ccif(0, false));
    critical_section::with(|cs| {
        if let Some(executor) = EXECUTOR.borrow(cs).borrow_mut().as_mut() {
            executor.on_compare();
        }
    });
}
