//! Motor control module for B-G431B-ESC1 BLDC motor
//!
//! Motor: ZD2808-V1.9 700KV
//! - Configuration: 12N14P (12 stator slots, 14 poles = 7 pole pairs)
//! - KV rating: 700 KV
//! - Voltage: 3S-4S LiPo (11.1-14.8V)
//! - Type: Outrunner disc motor
//!
//! The power stage is switched by the table-driven commutation engine: this
//! module only decides the three phase duties, the TIM3 interrupt does the
//! switching.

pub mod counter;
pub mod gates;
pub mod isr;
pub mod six_step;

use core::sync::atomic::{AtomicU8, Ordering};
use embassy_time::Duration;
use tripolar_engine::{DutyPort, Phase, PwmConfig};

use self::six_step::CommutationStep;

/// TIM3 ticking at 10 MHz (prescaler 17 from 170 MHz), 1 kHz PWM, 2 µs dead time
pub const BOARD_PWM: PwmConfig = PwmConfig {
    timer_freq_khz: 10_000,
    pwm_freq_hz: 1_000,
    dead_time_us: 2,
    min_timer_delta_us: 20,
    duty_full_scale: 1000,
    startup_delay_counts: 0x7FFF,
}
.validated();

/// Motor control commands
#[derive(Clone, Copy, Debug, defmt::Format)]
pub enum MotorCommand {
    Stop,
    Start { duty: u8 },    // duty: 0-100%
    SetSpeed { duty: u8 }, // duty: 0-100% (adjust while running)
}

/// Motor operational state
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum MotorState {
    Stopped = 0,
    Running = 1,
    /// Commutation halted by itself
    Error = 2,
}

/// Motor status snapshot
#[derive(Clone, Copy, Debug, defmt::Format)]
pub struct MotorStatus {
    pub state: MotorState,
    pub duty: u8, // Current duty cycle (0-100%)
    pub step: u8, // Current commutation step (0-5)
}

/// Motor physical parameters
pub struct MotorParams {
    /// Number of pole pairs (14 poles = 7 pole pairs)
    pub pole_pairs: u8,
    /// KV rating (RPM per volt)
    pub kv_rating: u16,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            pole_pairs: 7,  // ZD2808-V1.9: 14 poles = 7 pole pairs
            kv_rating: 700, // 700 KV
        }
    }
}

/// Open-loop drive limits
pub struct MotorConfig {
    /// Requested duty is clamped to this
    pub max_duty_percent: u8,
    /// Time per commutation step
    pub step_period_ms: u32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            max_duty_percent: 15, // 15% for very safe initial testing
            step_period_ms: 500,  // Very slow for initial testing (500ms per step = ~2.8 RPM)
        }
    }
}

/// Global motor state
static MOTOR_STATE: AtomicU8 = AtomicU8::new(MotorState::Stopped as u8);
static MOTOR_DUTY: AtomicU8 = AtomicU8::new(0);
static MOTOR_STEP: AtomicU8 = AtomicU8::new(0);

/// Set motor state
pub fn set_motor_state(state: MotorState) {
    MOTOR_STATE.store(state as u8, Ordering::Relaxed);
}

/// Get motor state
pub fn get_motor_state() -> MotorState {
    match MOTOR_STATE.load(Ordering::Relaxed) {
        0 => MotorState::Stopped,
        1 => MotorState::Running,
        _ => MotorState::Error,
    }
}

/// Set motor duty cycle
pub fn set_motor_duty(duty: u8) {
    MOTOR_DUTY.store(duty, Ordering::Relaxed);
}

/// Get motor duty cycle
pub fn get_motor_duty() -> u8 {
    MOTOR_DUTY.load(Ordering::Relaxed)
}

/// Set motor commutation step
pub fn set_motor_step(step: u8) {
    MOTOR_STEP.store(step, Ordering::Relaxed);
}

/// Get motor commutation step
pub fn get_motor_step() -> u8 {
    MOTOR_STEP.load(Ordering::Relaxed)
}

/// Get current motor status
pub fn get_motor_status() -> MotorStatus {
    MotorStatus {
        state: get_motor_state(),
        duty: get_motor_duty(),
        step: get_motor_step(),
    }
}

/// Motor control context
pub struct MotorController<'d> {
    port: DutyPort<'d>,
    config: MotorConfig,
    params: MotorParams,
    current_step: CommutationStep,
    target_duty: u8,
}

impl<'d> MotorController<'d> {
    /// Create a new motor controller around the engine's duty port
    pub fn new(port: DutyPort<'d>, config: MotorConfig) -> Self {
        set_motor_state(MotorState::Stopped);
        set_motor_duty(0);
        set_motor_step(0);

        defmt::info!(
            "Motor init: pwm={}Hz, dead time={}us, limit={}%",
            port.config().pwm_freq_hz,
            port.config().dead_time_us,
            config.max_duty_percent
        );

        let params = MotorParams::default();
        defmt::info!(
            "Motor: {} pole pairs, {} KV",
            params.pole_pairs,
            params.kv_rating
        );

        Self {
            port,
            config,
            params,
            current_step: CommutationStep::Step0,
            target_duty: 0,
        }
    }

    /// Handle motor command
    pub fn handle_command(&mut self, cmd: MotorCommand) {
        match cmd {
            MotorCommand::Stop => {
                defmt::info!("Motor command: STOP");
                self.stop();
            }
            MotorCommand::Start { duty } => {
                defmt::info!("Motor command: START duty={}", duty);
                self.start(duty);
            }
            MotorCommand::SetSpeed { duty } => {
                defmt::info!("Motor command: SET_SPEED duty={}", duty);
                self.set_speed(duty);
            }
        }
    }

    /// Start the motor with specified duty cycle
    fn start(&mut self, duty: u8) {
        if !self.port.is_enabled() {
            // Stopped or faulted: restart from all-off on the newest table
            isr::with_executor(|executor| executor.start());
        }

        let duty = duty.min(self.config.max_duty_percent);
        self.target_duty = duty;
        set_motor_duty(duty);
        set_motor_state(MotorState::Running);

        // Reset to step 0
        self.current_step = CommutationStep::Step0;
        set_motor_step(0);

        defmt::info!(
            "Motor started: duty={}%, open loop ~{} RPM",
            duty,
            self.mechanical_rpm()
        );
    }

    /// Stop the motor: commutation off, every FET open
    fn stop(&mut self) {
        isr::with_executor(|executor| executor.stop());
        self.target_duty = 0;
        for phase in Phase::ALL {
            self.port.set_pwm(phase, 0);
        }
        // Goes out at once since stop() took over any pending table; the next start runs it
        self.port.update();
        set_motor_state(MotorState::Stopped);
        set_motor_duty(0);
        defmt::info!("Motor stopped");
    }

    /// Set motor speed (adjust duty while running)
    fn set_speed(&mut self, duty: u8) {
        let duty = duty.min(self.config.max_duty_percent);
        self.target_duty = duty;
        set_motor_duty(duty);
        defmt::info!("Motor speed set: duty={}%", duty);
    }

    /// Retry a deferred table update and watch for a commutation fault.
    ///
    /// Call this far more often than the step period.
    pub fn tick(&mut self) {
        if self.port.tickle() {
            defmt::trace!("Deferred duty update published");
        }

        if get_motor_state() == MotorState::Running && !self.port.is_enabled() {
            defmt::error!("Commutation halted itself, motor in error state");
            set_motor_state(MotorState::Error);
            set_motor_duty(0);
        }
    }

    /// Perform one commutation step
    pub fn commutate(&mut self) {
        if get_motor_state() != MotorState::Running {
            return;
        }

        // The previous step's table has not reached the executor yet
        if self.port.busy() {
            defmt::debug!("Port busy, holding step {}", self.current_step.as_u8());
            return;
        }

        let duties = self.current_step.duties(self.duty_counts());
        for phase in Phase::ALL {
            self.port.set_pwm(phase, duties[phase.index()]);
        }
        self.port.update();

        // Update global state
        set_motor_step(self.current_step.as_u8());

        // Advance to next step
        self.current_step = self.current_step.next();
    }

    /// Target duty in port units
    fn duty_counts(&self) -> u16 {
        let full_scale = self.port.config().duty_full_scale as u32;
        (full_scale * self.target_duty as u32 / 100) as u16
    }

    /// Get commutation period based on desired speed
    pub fn get_commutation_period(&self) -> Duration {
        Duration::from_millis(self.config.step_period_ms as u64)
    }

    /// Open-loop mechanical speed the step period corresponds to, in RPM
    fn mechanical_rpm(&self) -> u32 {
        // Six steps per electrical revolution
        let electrical_rev_ms = 6 * self.config.step_period_ms * self.params.pole_pairs as u32;
        60_000 / electrical_rev_ms.max(1)
    }
}
