/**
 * Mode Arbiter
 *
 * Consumes inbound joystick events and decides who drives the target PWM:
 * - button 0 rising edge toggles Auto
 * - buttons 4-7 rising edges toggle the semi-auto direction
 *   (left, right, forward, down); pressing the active one clears it
 * - Auto drops every manual / semi-auto command
 * - semi-auto drives the fixed direction command, ignoring the sticks
 * - otherwise the conditioned sticks are allocated, with the idle rule
 *
 * Button edges and the resulting target write happen under one helm lock.
 */

use log::{debug, info};

use super::conditioner::InputConditioner;
use super::state::{ControlState, Direction, Mode};
use super::thrust_mixer::{DofInputs, PwmVector};
use crate::error::{ControlError, Result};

pub const BUTTON_AUTO: usize = 0;
/// Events with fewer buttons than this skip button handling entirely
pub const MIN_BUTTONS: usize = 8;

const SEMI_AUTO_BUTTONS: [(usize, Direction); 4] = [
    (4, Direction::Left),
    (5, Direction::Right),
    (6, Direction::Forward),
    (7, Direction::Down),
];

/// Validated inbound event from the UI / joystick collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct JoystickEvent {
    pub axes: DofInputs,
    pub buttons: Vec<bool>,
}

impl JoystickEvent {
    /// Axes must be finite; they are clamped into [-1, 1].
    pub fn new(surge: f32, sway: f32, heave: f32, buttons: Vec<bool>) -> Result<Self> {
        for (name, value) in [("surge", surge), ("sway", sway), ("heave", heave)] {
            if !value.is_finite() {
                return Err(ControlError::InvalidEvent(format!("{} is not finite", name)));
            }
        }
        Ok(Self {
            axes: DofInputs::new(
                surge.clamp(-1.0, 1.0),
                sway.clamp(-1.0, 1.0),
                heave.clamp(-1.0, 1.0),
            ),
            buttons,
        })
    }

    /// Buttons as boolean-like integers, non-zero meaning pressed
    pub fn from_raw(surge: f32, sway: f32, heave: f32, buttons: &[i32]) -> Result<Self> {
        Self::new(surge, sway, heave, buttons.iter().map(|&b| b != 0).collect())
    }

    pub fn axes_only(surge: f32, sway: f32, heave: f32) -> Result<Self> {
        Self::new(surge, sway, heave, vec![false; MIN_BUTTONS])
    }

    pub fn pressed(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }
}

/// What handling one event did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterOutcome {
    /// Generation of a freshly started Auto run; the caller spawns it
    pub started_auto: Option<u64>,
    pub cancelled_auto: bool,
    /// False when the event was dropped because Auto owns the target
    pub target_written: bool,
}

#[derive(Debug, Clone)]
pub struct ModeArbiter {
    conditioner: InputConditioner,
    last_buttons: Vec<bool>,
}

impl Default for ModeArbiter {
    fn default() -> Self {
        Self::new(InputConditioner::default())
    }
}

impl ModeArbiter {
    pub fn new(conditioner: InputConditioner) -> Self {
        Self {
            conditioner,
            last_buttons: Vec::new(),
        }
    }

    fn rising(&self, event: &JoystickEvent, index: usize) -> bool {
        event.pressed(index) && !self.last_buttons.get(index).copied().unwrap_or(false)
    }

    pub fn handle(&mut self, state: &ControlState, event: &JoystickEvent) -> ArbiterOutcome {
        let matrix = state.matrix();
        let mut outcome = ArbiterOutcome::default();
        let mut helm = state.helm();

        if event.buttons.len() >= MIN_BUTTONS {
            if self.rising(event, BUTTON_AUTO) {
                if helm.auto_active() {
                    outcome.cancelled_auto = helm.cancel_auto();
                    info!(target: "arbiter", "Auto mode deactivated");
                } else {
                    let run = helm.begin_auto();
                    outcome.started_auto = Some(run);
                    info!(target: "arbiter", "Auto mode activated (run {})", run);
                }
            }

            for (button, direction) in SEMI_AUTO_BUTTONS {
                if self.rising(event, button) {
                    let next = if helm.semi_auto() == Some(direction) { None } else { Some(direction) };
                    helm.set_semi_auto(next);
                    info!(
                        target: "arbiter",
                        "semi-auto {}: {}",
                        direction.name(),
                        next.map(|d| d.name()).unwrap_or("none")
                    );
                }
            }

            self.last_buttons = event.buttons.clone();
        } else {
            debug!(target: "arbiter", "event with {} buttons, skipping button handling", event.buttons.len());
        }

        match helm.mode() {
            Mode::Auto => {
                debug!(target: "arbiter", "Auto active, input dropped");
            }
            Mode::SemiAuto(direction) => {
                helm.set_target(matrix.allocate(&direction.inputs()));
                outcome.target_written = true;
            }
            Mode::Manual => {
                debug!(
                    target: "arbiter",
                    "raw axes - surge: {:.2}, sway: {:.2}, heave: {:.2}",
                    event.axes.surge, event.axes.sway, event.axes.heave
                );
                let inputs = self.conditioner.condition(&event.axes);
                debug!(target: "arbiter", "filtered inputs: {:?}", inputs.as_array());

                let target = if self.conditioner.is_idle(&inputs) {
                    debug!(target: "arbiter", "inputs near zero, target reset to neutral");
                    PwmVector::NEUTRAL
                } else {
                    matrix.allocate(&inputs)
                };
                helm.set_target(target);
                outcome.target_written = true;
            }
        }

        outcome
    }
}
