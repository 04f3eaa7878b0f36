/**
 * AUV Controller
 *
 * Owns the three device channels and the shared control state, and runs:
 * 1. Ramp scheduler: slews current PWM toward target, drives the thrusters
 * 2. Switch monitor: keeps the contact switch state current
 * 3. Auto sequences: spawned when the arbiter starts an Auto run
 *
 * Joystick events come in through `handle_event`; observers read the
 * `/auv/pwm` and `/auv/switches` topics or take a `snapshot()`.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{info, warn};

use super::arbiter::{ArbiterOutcome, JoystickEvent, ModeArbiter};
use super::ramp::RampScheduler;
use super::sequence::spawn_sequence;
use super::state::{lock, ControlState, Mode, SwitchState};
use super::switches::SwitchMonitor;
use super::thrust_mixer::{PwmVector, ThrustAllocationMatrix};
use crate::config::{ChannelConfig, ControllerConfig};
use crate::error::Result;
use crate::pubsub::{Publisher, Subscriber, TopicRegistry, PWM_TOPIC, SWITCH_TOPIC, TOPIC_CAPACITY};
use crate::uart::{Channel, DeviceChannel, MotorCommand};

/// The three device channels. Each is shared, one operation at a time.
#[derive(Clone)]
pub struct Channels {
    pub thrusters: Arc<Channel>,
    pub motor: Arc<Channel>,
    pub switches: Arc<Channel>,
}

impl Channels {
    /// Open all three serial ports. Fails on the first one that cannot open.
    pub fn open(config: &ChannelConfig) -> Result<Self> {
        let timeout = config.read_timeout();
        let thrusters = Channel::open_serial(&config.thrusters, config.baud, timeout)?;
        let motor = Channel::open_serial(&config.motor, config.baud, timeout)?;
        let switches = Channel::open_serial(&config.switches, config.baud, timeout)?;
        info!(
            target: "channel",
            "opened {}, {}, {} at {} baud",
            config.thrusters, config.motor, config.switches, config.baud
        );
        Ok(Self {
            thrusters: Arc::new(thrusters),
            motor: Arc::new(motor),
            switches: Arc::new(switches),
        })
    }

    pub fn from_devices(
        thrusters: Box<dyn DeviceChannel>,
        motor: Box<dyn DeviceChannel>,
        switches: Box<dyn DeviceChannel>,
    ) -> Self {
        Self {
            thrusters: Arc::new(Channel::new("thrusters", thrusters)),
            motor: Arc::new(Channel::new("motor", motor)),
            switches: Arc::new(Channel::new("switches", switches)),
        }
    }
}

/// Everything an observer gets on connect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSnapshot {
    pub current: PwmVector,
    pub target: PwmVector,
    pub switches: SwitchState,
    pub mode: Mode,
}

pub struct AuvController {
    config: ControllerConfig,
    state: Arc<ControlState>,
    registry: Arc<TopicRegistry>,
    channels: Channels,
    arbiter: Mutex<ModeArbiter>,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    sequences: Mutex<Vec<JoinHandle<()>>>,
}

impl AuvController {
    pub fn new(config: ControllerConfig, channels: Channels) -> Self {
        let registry = Arc::new(TopicRegistry::new());
        registry.get_or_create::<PwmVector>(PWM_TOPIC, TOPIC_CAPACITY);
        registry.get_or_create::<SwitchState>(SWITCH_TOPIC, TOPIC_CAPACITY);

        Self {
            state: Arc::new(ControlState::new(config.matrix())),
            arbiter: Mutex::new(ModeArbiter::new(config.conditioner())),
            config,
            registry,
            channels,
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
            sequences: Mutex::new(Vec::new()),
        }
    }

    /// Open the serial channels named in `config`, then wait `settle_ms` while
    /// the boards reset
    pub fn open(config: ControllerConfig) -> Result<Self> {
        let channels = Channels::open(&config.channels)?;
        let settle = config.channels.settle();
        if !settle.is_zero() {
            info!(target: "channel", "waiting {:?} for the boards to reset", settle);
            thread::sleep(settle);
        }
        Ok(Self::new(config, channels))
    }

    /// Start the ramp scheduler and switch monitor. Calling it again while
    /// running does nothing.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let ramp = RampScheduler::new(
            Arc::clone(&self.state),
            Arc::clone(&self.channels.thrusters),
            Publisher::new(self.registry.get_or_create(PWM_TOPIC, TOPIC_CAPACITY)),
        )
        .with_rate(self.config.ramp.step, self.config.ramp_tick());

        let monitor = SwitchMonitor::new(
            Arc::clone(&self.state),
            Arc::clone(&self.channels.switches),
            Publisher::new(self.registry.get_or_create(SWITCH_TOPIC, TOPIC_CAPACITY)),
        )
        .with_poll(self.config.switch_poll());

        let mut tasks = lock(&self.tasks);
        let spawned = ramp
            .spawn(Arc::clone(&self.running))
            .and_then(|ramp| {
                tasks.push(ramp);
                monitor.spawn(Arc::clone(&self.running))
            });
        match spawned {
            Ok(monitor) => {
                tasks.push(monitor);
                info!(target: "controller", "controller started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                for task in tasks.drain(..) {
                    let _ = task.join();
                }
                Err(e.into())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop every task. The ramp scheduler sends a neutral frame on its way
    /// out. Any Auto run is cancelled.
    pub fn shutdown(&self) {
        if self.state.cancel_auto() {
            info!(target: "controller", "Auto run cancelled by shutdown");
        }
        for run in lock(&self.sequences).drain(..) {
            let _ = run.join();
        }

        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for task in lock(&self.tasks).drain(..) {
            if task.join().is_err() {
                warn!(target: "controller", "a control task panicked");
            }
        }
        info!(target: "controller", "shutdown complete");
    }

    /// Feed one joystick event through the mode arbiter
    pub fn handle_event(&self, event: &JoystickEvent) -> Result<ArbiterOutcome> {
        let outcome = lock(&self.arbiter).handle(&self.state, event);

        if let Some(run) = outcome.started_auto {
            match spawn_sequence(Arc::clone(&self.state), run, self.config.timings()) {
                Ok(handle) => {
                    let mut sequences = lock(&self.sequences);
                    sequences.retain(|h| !h.is_finished());
                    sequences.push(handle);
                }
                Err(e) => {
                    warn!(target: "controller", "could not start Auto run {}: {}", run, e);
                    self.state.cancel_auto();
                    return Err(e.into());
                }
            }
        }

        Ok(outcome)
    }

    /// Raw form used by the bindings: buttons as integers, non-zero pressed
    pub fn joystick(&self, surge: f32, sway: f32, heave: f32, buttons: &[i32]) -> Result<ArbiterOutcome> {
        let event = JoystickEvent::from_raw(surge, sway, heave, buttons)?;
        self.handle_event(&event)
    }

    pub fn cancel_auto(&self) -> bool {
        self.state.cancel_auto()
    }

    pub fn tam(&self) -> ThrustAllocationMatrix {
        self.state.matrix()
    }

    /// Replace the allocation matrix. A malformed matrix is rejected and the
    /// current one stays in use.
    pub fn set_tam(&self, rows: &[Vec<f32>]) -> Result<()> {
        self.state.replace_matrix_rows(rows)
    }

    pub fn replace_tam(&self, matrix: ThrustAllocationMatrix) {
        self.state.replace_matrix(matrix);
    }

    /// Send a command to the auxiliary motor board and return its reply
    /// (empty if the board said nothing before the read timeout).
    pub fn motor_command(&self, command: &MotorCommand) -> Result<String> {
        let line = command.encode();
        let reply = self.channels.motor.transact(&line).map_err(|e| {
            warn!(target: "channel", "motor command {:?} failed: {}", line.trim(), e);
            e
        })?;
        let reply = reply.unwrap_or_default().trim().to_string();
        info!(target: "controller", "motor command {:?} -> {:?}", line.trim(), reply);
        Ok(reply)
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let (target, mode) = {
            let helm = self.state.helm();
            (helm.target(), helm.mode())
        };
        ControlSnapshot {
            current: self.state.current(),
            target,
            switches: self.state.switches(),
            mode,
        }
    }

    pub fn current_pwm(&self) -> PwmVector {
        self.state.current()
    }

    pub fn target_pwm(&self) -> PwmVector {
        self.state.target()
    }

    pub fn switches(&self) -> SwitchState {
        self.state.switches()
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    pub fn pwm_subscriber(&self) -> Subscriber<PwmVector> {
        Subscriber::new(self.registry.get_or_create(PWM_TOPIC, TOPIC_CAPACITY))
    }

    pub fn switch_subscriber(&self) -> Subscriber<SwitchState> {
        Subscriber::new(self.registry.get_or_create(SWITCH_TOPIC, TOPIC_CAPACITY))
    }
}

impl Drop for AuvController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
