/**
 * Controller Configuration
 *
 * Loaded from JSON. Every field has a default matching the vehicle's stock
 * setup, so an empty object `{}` is a complete configuration. Durations are
 * given in milliseconds.
 */

use std::path::Path;
use std::time::Duration;

use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};

use crate::auv::conditioner::{InputConditioner, DEFAULT_DEADZONE, DEFAULT_WINDOW};
use crate::auv::ramp::DEFAULT_STEP;
use crate::auv::sequence::{ConfirmPolicy, SequenceTimings};
use crate::auv::thrust_mixer::ThrustAllocationMatrix;
use crate::error::{ControlError, Result};
use crate::logging;
use crate::uart::DEFAULT_BAUD;

/// Longest accepted switch/sequence poll interval
pub const MAX_POLL_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub thrusters: String,
    pub motor: String,
    pub switches: String,
    pub baud: u32,
    pub read_timeout_ms: u64,
    /// The boards reset when their port opens; wait this long before driving them
    pub settle_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            thrusters: "/dev/thrusters".to_string(),
            motor: "/dev/MotorBrush".to_string(),
            switches: "/dev/switch_sound".to_string(),
            baud: DEFAULT_BAUD,
            read_timeout_ms: 1000,
            settle_ms: 2000,
        }
    }
}

impl ChannelConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    pub step: i32,
    pub tick_ms: u64,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self { step: DEFAULT_STEP, tick_ms: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub deadzone: f32,
    pub window: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub push_descend_ms: u64,
    pub settle_ms: u64,
    pub confirm_ms: u64,
    pub stop_ms: u64,
    pub surface_ms: u64,
    pub surface_cap: u32,
    pub poll_ms: u64,
    pub confirm_policy: ConfirmPolicy,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self::from_timings(&SequenceTimings::default())
    }
}

impl SequenceConfig {
    fn from_timings(t: &SequenceTimings) -> Self {
        Self {
            push_descend_ms: t.push_descend.as_millis() as u64,
            settle_ms: t.settle.as_millis() as u64,
            confirm_ms: t.confirm.as_millis() as u64,
            stop_ms: t.stop.as_millis() as u64,
            surface_ms: t.surface.as_millis() as u64,
            surface_cap: t.surface_cap,
            poll_ms: t.poll.as_millis() as u64,
            confirm_policy: t.confirm_policy,
        }
    }

    pub fn to_timings(&self) -> SequenceTimings {
        SequenceTimings {
            push_descend: Duration::from_millis(self.push_descend_ms),
            settle: Duration::from_millis(self.settle_ms),
            confirm: Duration::from_millis(self.confirm_ms),
            stop: Duration::from_millis(self.stop_ms),
            surface: Duration::from_millis(self.surface_ms),
            surface_cap: self.surface_cap,
            poll: Duration::from_millis(self.poll_ms),
            confirm_policy: self.confirm_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub channels: ChannelConfig,
    pub ramp: RampConfig,
    pub input: InputConfig,
    pub switch_poll_ms: u64,
    pub sequence: SequenceConfig,
    /// 8 rows of [surge, sway, heave] coefficients
    pub tam: Vec<Vec<f32>>,
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            channels: ChannelConfig::default(),
            ramp: RampConfig::default(),
            input: InputConfig::default(),
            switch_poll_ms: 50,
            sequence: SequenceConfig::default(),
            tam: ThrustAllocationMatrix::default().to_rows(),
            log_level: "info".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ControlError::Config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ControlError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Reject values that would stall or break a control task. The matrix is
    /// not checked here; see `matrix()`.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(ControlError::Config(msg.to_string()));

        if self.channels.baud == 0 {
            return fail("baud rate must be positive");
        }
        if self.ramp.step <= 0 {
            return fail("ramp step must be positive");
        }
        if self.ramp.tick_ms == 0 {
            return fail("ramp tick must be positive");
        }
        if !(0.0..1.0).contains(&self.input.deadzone) {
            return fail("deadzone must be in [0, 1)");
        }
        if self.input.window == 0 {
            return fail("smoothing window must hold at least one sample");
        }
        if self.switch_poll_ms == 0 || self.sequence.poll_ms == 0 {
            return fail("poll intervals must be positive");
        }
        if self.switch_poll_ms > MAX_POLL_MS || self.sequence.poll_ms > MAX_POLL_MS {
            return Err(ControlError::Config(format!(
                "poll intervals must not exceed {} ms",
                MAX_POLL_MS
            )));
        }
        if self.sequence.surface_cap == 0 {
            return fail("surface cap must be at least 1");
        }
        Ok(())
    }

    /// The configured matrix, or the stock one if the configured rows are
    /// malformed.
    pub fn matrix(&self) -> ThrustAllocationMatrix {
        match ThrustAllocationMatrix::from_rows(&self.tam) {
            Ok(matrix) => matrix,
            Err(e) => {
                warn!(target: "controller", "{}; using the default matrix", e);
                ThrustAllocationMatrix::default()
            }
        }
    }

    pub fn conditioner(&self) -> InputConditioner {
        InputConditioner::new(self.input.deadzone, self.input.window)
    }

    pub fn ramp_tick(&self) -> Duration {
        Duration::from_millis(self.ramp.tick_ms)
    }

    pub fn switch_poll(&self) -> Duration {
        Duration::from_millis(self.switch_poll_ms)
    }

    pub fn timings(&self) -> SequenceTimings {
        self.sequence.to_timings()
    }

    pub fn log_level(&self) -> LevelFilter {
        logging::parse_level(&self.log_level)
    }
}
