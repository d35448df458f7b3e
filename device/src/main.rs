#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use rtt_target::{ChannelMode::*, rtt_init};
use static_cell::StaticCell;
use tripolar_engine::Commutation;

mod motor;
use motor::counter::CounterTimer;
use motor::gates::GateDriver;
use motor::{BOARD_PWM, MotorCommand, MotorConfig, MotorController, MotorState};

// Use panic-probe for panics
use panic_probe as _;

/// Duty a single click starts the motor with, in percent
const START_DUTY: u8 = 5;
/// Duty added per double click, in percent
const DUTY_STEP: u8 = 5;
/// How often the motor task retries deferred table updates
const TICKLE_PERIOD: Duration = Duration::from_millis(2);

type MotorCmdChannel = Channel<CriticalSectionRawMutex, MotorCommand, 4>;

/// Statically store the double-buffered commutation tables
static COMMUTATION: StaticCell<Commutation> = StaticCell::new();

/// Static channel for motor commands
static MOTOR_CMD_CHANNEL: StaticCell<MotorCmdChannel> = StaticCell::new();

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum DeviceState {
    Boot = 0,
    Idle = 1,
    Running = 2,
    Error = 3,
}

static DEVICE_STATE: AtomicU8 = AtomicU8::new(DeviceState::Boot as u8);

fn set_device_state(s: DeviceState) {
    DEVICE_STATE.store(s as u8, Ordering::Relaxed);
}

fn get_device_state() -> DeviceState {
    match DEVICE_STATE.load(Ordering::Relaxed) {
        0 => DeviceState::Boot,
        1 => DeviceState::Idle,
        2 => DeviceState::Running,
        _ => DeviceState::Error,
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // defmt logs on up channel 0
    let channels = rtt_init! {
        up: {
            0: { size: 1024, mode: NoBlockSkip, name: "defmt" }
        }
    };
    rtt_target::set_defmt_channel(channels.up.0);

    // Initialize STM32 with HSE=8MHz feeding PLL to 170MHz SYSCLK
    let p = {
        let mut config = embassy_stm32::Config::default();
        {
            use embassy_stm32::rcc::*;
            use embassy_stm32::time::Hertz;
            // Use external 8MHz HSE oscillator as PLL source
            config.rcc.hse = Some(Hse {
                freq: Hertz(8_000_000),
                mode: HseMode::Oscillator,
            });
            // VCO in: 8MHz / 2 = 4MHz; VCO: 4MHz * 85 = 340MHz; SYSCLK: 340MHz / 2 = 170MHz
            config.rcc.pll = Some(Pll {
                source: PllSource::HSE,
                prediv: PllPreDiv::DIV2,
                mul: PllMul::MUL85,
                divp: None,
                divq: None,
                divr: Some(PllRDiv::DIV2),
            });
            config.rcc.sys = Sysclk::PLL1_R;
            // Above 150MHz, enable Range1 boost mode per RM0440 guidance
            config.rcc.boost = true;
        }
        embassy_stm32::init(config)
    };

    defmt::info!("Tripolar starting - table-driven PWM on TIM3");

    // Button: PC10, external pull-up, active-low to GND
    let button = ExtiInput::new(p.PC10, p.EXTI10, Pull::None);
    defmt::info!("Button configured on PC10 (active-low)");

    // LED on PC6
    let mut led = Output::new(p.PC6, Level::Low, Speed::Low);

    // Gate pins of the power stage, all off
    let gates = GateDriver::new(
        p.PA8,  // Phase A high
        p.PC13, // Phase A low
        p.PA9,  // Phase B high
        p.PA12, // Phase B low
        p.PA10, // Phase C high
        p.PB15, // Phase C low
    );
    let counter = CounterTimer::new(p.TIM3, &BOARD_PWM);

    let commutation = COMMUTATION.init(Commutation::new(BOARD_PWM));
    let (port, executor) = commutation.split(gates, counter);
    motor::isr::install(executor);

    let motor_ctrl = MotorController::new(port, MotorConfig::default());

    // Initialize motor command channel
    let motor_cmd_channel = MOTOR_CMD_CHANNEL.init(Channel::new());
    let motor_cmd_receiver = motor_cmd_channel.receiver();
    let motor_cmd_sender = motor_cmd_channel.sender();

    spawner.spawn(button_handler(button, motor_cmd_sender)).unwrap();
    spawner.spawn(status_reporter()).unwrap();
    spawner.spawn(motor_control_task(motor_ctrl, motor_cmd_receiver)).unwrap();

    set_device_state(DeviceState::Idle);

    defmt::info!("All tasks spawned, entering LED status loop");

    // LED status loop - shows device state via blink patterns
    loop {
        match get_device_state() {
            DeviceState::Boot => {
                // Quick double blink
                for _ in 0..2 {
                    led.set_high();
                    Timer::after(Duration::from_millis(100)).await;
                    led.set_low();
                    Timer::after(Duration::from_millis(100)).await;
                }
                Timer::after(Duration::from_millis(600)).await;
            }
            DeviceState::Idle => {
                // Slow blink (1 Hz, 10% duty)
                led.set_high();
                Timer::after(Duration::from_millis(100)).await;
                led.set_low();
                Timer::after(Duration::from_millis(900)).await;
            }
            DeviceState::Running => {
                // Solid ON with periodic short delay to allow state changes
                led.set_high();
                Timer::after(Duration::from_millis(500)).await;
            }
            DeviceState::Error => {
                // Triple blink pattern
                for _ in 0..3 {
                    led.set_high();
                    Timer::after(Duration::from_millis(120)).await;
                    led.set_low();
                    Timer::after(Duration::from_millis(120)).await;
                }
                Timer::after(Duration::from_millis(800)).await;
            }
        }
    }
}

/// Single click toggles start/stop, double click raises duty, hold is an emergency stop
#[embassy_executor::task]
async fn button_handler(
    mut button: ExtiInput<'static>,
    motor_cmd_sender: Sender<'static, CriticalSectionRawMutex, MotorCommand, 4>,
) {
    const DOUBLE_CLICK_DELAY: u64 = 250;
    const HOLD_DELAY: u64 = 1000;

    defmt::info!("Button ready (active-low)");

    loop {
        // Wait for press (active-low => falling edge)
        button.wait_for_falling_edge().await;

        // If release does not happen within HOLD_DELAY, it's a hold
        if with_timeout(
            Duration::from_millis(HOLD_DELAY),
            button.wait_for_rising_edge(),
        )
        .await
        .is_err()
        {
            defmt::info!("Button: HOLD");
            motor_cmd_sender.send(MotorCommand::Stop).await;
            // Ensure we're released before next iteration
            button.wait_for_rising_edge().await;
            continue;
        }

        // Released within hold window: check for a second press within DOUBLE_CLICK_DELAY
        if with_timeout(
            Duration::from_millis(DOUBLE_CLICK_DELAY),
            button.wait_for_falling_edge(),
        )
        .await
        .is_ok()
        {
            defmt::info!("Button: DOUBLE CLICK");
            let duty = motor::get_motor_duty().saturating_add(DUTY_STEP).min(100);
            motor_cmd_sender.send(MotorCommand::SetSpeed { duty }).await;
            // Wait for final release
            button.wait_for_rising_edge().await;
        } else {
            defmt::info!("Button: SINGLE CLICK");
            let cmd = match motor::get_motor_state() {
                MotorState::Running => MotorCommand::Stop,
                MotorState::Stopped | MotorState::Error => MotorCommand::Start { duty: START_DUTY },
            };
            motor_cmd_sender.send(cmd).await;
        }
    }
}

#[embassy_executor::task]
async fn status_reporter() {
    defmt::info!("Status reporter started");

    loop {
        Timer::after(Duration::from_secs(5)).await;
        let status = motor::get_motor_status();
        defmt::info!(
            "Motor: state={}, duty={}%, step={}",
            status.state,
            status.duty,
            status.step
        );
    }
}

/// Motor control task - steps the 6-step pattern and handles commands
#[embassy_executor::task]
async fn motor_control_task(
    mut motor: MotorController<'static>,
    cmd_receiver: Receiver<'static, CriticalSectionRawMutex, MotorCommand, 4>,
) {
    defmt::info!("Motor control task started");

    let mut next_step = Instant::now();

    loop {
        if let Either::First(cmd) = select(cmd_receiver.receive(), Timer::after(TICKLE_PERIOD)).await {
            motor.handle_command(cmd);
        }

        motor.tick();

        if Instant::now() >= next_step {
            motor.commutate();
            next_step = Instant::now() + motor.get_commutation_period();
        }

        set_device_state(match motor::get_motor_state() {
            MotorState::Stopped => DeviceState::Idle,
            MotorState::Running => DeviceState::Running,
            MotorState::Error => DeviceState::Error,
        });
    }
}
