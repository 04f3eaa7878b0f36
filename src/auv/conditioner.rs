/**
 * Input Conditioner
 *
 * Deadzone + moving-average smoothing for the three raw joystick axes.
 * Each axis owns an independent fixed-size window that starts full of zeros,
 * so the first few readings after start-up are attenuated.
 */

use super::thrust_mixer::DofInputs;

pub const DEFAULT_DEADZONE: f32 = 0.05;
pub const DEFAULT_WINDOW: usize = 5;

/// Circular averaging window for one axis
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    samples: Vec<f32>,
    next: usize,
}

impl SmoothingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "smoothing window needs at least one slot");
        Self {
            samples: vec![0.0; capacity],
            next: 0,
        }
    }

    /// Overwrite the oldest sample and return the mean over the whole window
    pub fn push(&mut self, value: f32) -> f32 {
        self.samples[self.next] = value;
        self.next = (self.next + 1) % self.samples.len();
        self.mean()
    }

    pub fn mean(&self) -> f32 {
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }
}

/// Deadzone filter plus smoother for surge, sway and heave
#[derive(Debug, Clone)]
pub struct InputConditioner {
    deadzone: f32,
    channels: [SmoothingWindow; 3],
}

impl Default for InputConditioner {
    fn default() -> Self {
        Self::new(DEFAULT_DEADZONE, DEFAULT_WINDOW)
    }
}

impl InputConditioner {
    pub fn new(deadzone: f32, window: usize) -> Self {
        Self {
            deadzone,
            channels: [
                SmoothingWindow::new(window),
                SmoothingWindow::new(window),
                SmoothingWindow::new(window),
            ],
        }
    }

    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    fn apply_deadzone(&self, raw: f32) -> f32 {
        if raw.abs() < self.deadzone {
            0.0
        } else {
            raw
        }
    }

    /// Condition a single axis (0 = surge, 1 = sway, 2 = heave)
    fn condition_axis(&mut self, axis: usize, raw: f32) -> f32 {
        let filtered = self.apply_deadzone(raw);
        self.channels[axis].push(filtered)
    }

    pub fn condition(&mut self, raw: &DofInputs) -> DofInputs {
        DofInputs {
            surge: self.condition_axis(0, raw.surge),
            sway: self.condition_axis(1, raw.sway),
            heave: self.condition_axis(2, raw.heave),
        }
    }

    /// Residual-noise check applied after allocation: if every conditioned
    /// axis sits inside the deadzone the target is forced to neutral.
    pub fn is_idle(&self, conditioned: &DofInputs) -> bool {
        conditioned.is_near_zero(self.deadzone)
    }
}
