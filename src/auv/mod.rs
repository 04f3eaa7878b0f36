/**
 * AUV Control Module
 *
 * Control core for an eight-thruster vehicle:
 * - thrust allocation (DoF inputs -> per-thruster PWM)
 * - input conditioning and mode arbitration for joystick events
 * - ramped actuator output and contact switch monitoring
 * - the autonomous wall-following sequence
 *
 * `AuvController` ties them together over shared state.
 */

pub mod arbiter;
pub mod conditioner;
pub mod controller;
pub mod ramp;
pub mod sequence;
pub mod state;
pub mod switches;
pub mod thrust_mixer;

pub use arbiter::{ArbiterOutcome, JoystickEvent, ModeArbiter};
pub use conditioner::InputConditioner;
pub use controller::{AuvController, Channels, ControlSnapshot};
pub use ramp::RampScheduler;
pub use sequence::{AutoPhase, AutoSequence, ConfirmPolicy, SequenceTimings};
pub use state::{ControlState, Direction, Mode, SwitchState};
pub use switches::SwitchMonitor;
pub use thrust_mixer::{DofInputs, PwmVector, ThrustAllocationMatrix};
