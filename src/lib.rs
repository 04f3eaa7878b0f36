pub mod auv;
pub mod config;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod pubsub;
pub mod ring_buffer;
pub mod uart;

#[cfg(feature = "python")]
pub mod python;

pub use ring_buffer::RingBuffer;

pub use pubsub::{
    Message, Topic,
    Publisher, Subscriber,
    TopicRegistry,
};

pub use auv::{
    AuvController, Channels, ControlSnapshot,
    DofInputs, JoystickEvent, Mode, PwmVector, SwitchState, ThrustAllocationMatrix,
};
pub use config::ControllerConfig;
pub use error::{ControlError, Result};
pub use uart::MotorCommand;
