/**
 * Shared Control State
 *
 * One object holding everything the control tasks share, handed to each
 * task as an `Arc<ControlState>`:
 * - the helm (target PWM + mode), guarded by a single mutex so mode checks
 *   and target writes are one atomic read-modify-write
 * - current PWM, written only by the ramp task
 * - switch state, written only by the switch monitor
 * - the thrust allocation matrix, replaced whole
 *
 * Auto runs are tagged with a generation number. Cancelling Auto retires the
 * running generation, after which that sequence can no longer touch the
 * target and exits at its next poll.
 */

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use log::{info, warn};

use super::thrust_mixer::{DofInputs, PwmVector, ThrustAllocationMatrix};
use crate::error::Result;

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
/// A control task dying mid-tick must not take the others down with it.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Contact switch readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SwitchState {
    pub left: bool,
    pub right: bool,
}

impl SwitchState {
    pub fn as_array(&self) -> [bool; 2] {
        [self.left, self.right]
    }
}

/// Semi-automatic drive directions, selected by buttons 4-7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Forward,
    Down,
}

impl Direction {
    /// Fixed DoF command driven while this direction is selected
    pub fn inputs(&self) -> DofInputs {
        match self {
            Direction::Left => DofInputs::new(1.0, -1.0, 0.0),
            Direction::Right => DofInputs::new(1.0, 1.0, 0.0),
            Direction::Forward => DofInputs::new(1.0, 0.0, 0.0),
            Direction::Down => DofInputs::new(0.0, 0.0, -1.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Forward => "forward",
            Direction::Down => "down",
        }
    }
}

/// Which source currently owns the target PWM vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Manual,
    SemiAuto(Direction),
    Auto,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Manual => write!(f, "manual"),
            Mode::SemiAuto(dir) => write!(f, "semi-auto ({})", dir.name()),
            Mode::Auto => write!(f, "auto"),
        }
    }
}

/// Target PWM and the mode flags that decide who may write it
#[derive(Debug)]
pub struct Helm {
    target: PwmVector,
    semi_auto: Option<Direction>,
    auto_run: Option<u64>,
    last_run: u64,
}

impl Helm {
    fn new() -> Self {
        Self {
            target: PwmVector::NEUTRAL,
            semi_auto: None,
            auto_run: None,
            last_run: 0,
        }
    }

    /// Auto pre-empts semi-auto regardless of the selected direction
    pub fn mode(&self) -> Mode {
        if self.auto_run.is_some() {
            Mode::Auto
        } else if let Some(dir) = self.semi_auto {
            Mode::SemiAuto(dir)
        } else {
            Mode::Manual
        }
    }

    pub fn target(&self) -> PwmVector {
        self.target
    }

    pub fn semi_auto(&self) -> Option<Direction> {
        self.semi_auto
    }

    pub fn auto_active(&self) -> bool {
        self.auto_run.is_some()
    }

    pub(crate) fn set_target(&mut self, target: PwmVector) {
        self.target = target;
    }

    pub(crate) fn set_semi_auto(&mut self, direction: Option<Direction>) {
        self.semi_auto = direction;
    }

    /// Start a new Auto run and return its generation
    pub(crate) fn begin_auto(&mut self) -> u64 {
        self.last_run += 1;
        self.auto_run = Some(self.last_run);
        self.last_run
    }

    /// Retire the running Auto generation and force neutral
    pub(crate) fn cancel_auto(&mut self) -> bool {
        if self.auto_run.take().is_some() {
            self.target = PwmVector::NEUTRAL;
            true
        } else {
            false
        }
    }
}

pub struct ControlState {
    helm: Mutex<Helm>,
    current: Mutex<PwmVector>,
    switches: Mutex<SwitchState>,
    matrix: RwLock<ThrustAllocationMatrix>,
}

impl ControlState {
    pub fn new(matrix: ThrustAllocationMatrix) -> Self {
        Self {
            helm: Mutex::new(Helm::new()),
            current: Mutex::new(PwmVector::NEUTRAL),
            switches: Mutex::new(SwitchState::default()),
            matrix: RwLock::new(matrix),
        }
    }

    pub(crate) fn helm(&self) -> MutexGuard<'_, Helm> {
        lock(&self.helm)
    }

    pub fn target(&self) -> PwmVector {
        self.helm().target
    }

    pub fn mode(&self) -> Mode {
        self.helm().mode()
    }

    pub fn current(&self) -> PwmVector {
        *lock(&self.current)
    }

    pub(crate) fn set_current(&self, pwm: PwmVector) {
        *lock(&self.current) = pwm;
    }

    pub fn switches(&self) -> SwitchState {
        *lock(&self.switches)
    }

    pub(crate) fn set_switches(&self, switches: SwitchState) {
        *lock(&self.switches) = switches;
    }

    pub fn matrix(&self) -> ThrustAllocationMatrix {
        *self.matrix.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn replace_matrix(&self, matrix: ThrustAllocationMatrix) {
        *self.matrix.write().unwrap_or_else(PoisonError::into_inner) = matrix;
        info!(target: "controller", "thrust allocation matrix replaced");
    }

    /// Validate and install a matrix; on failure the last valid one stays.
    pub fn replace_matrix_rows(&self, rows: &[Vec<f32>]) -> Result<()> {
        match ThrustAllocationMatrix::from_rows(rows) {
            Ok(matrix) => {
                self.replace_matrix(matrix);
                Ok(())
            }
            Err(e) => {
                warn!(target: "controller", "rejected matrix update, keeping previous: {}", e);
                Err(e)
            }
        }
    }

    /// Write a target on behalf of an Auto run. Ignored once the run is stale.
    pub(crate) fn write_auto_target(&self, run: u64, target: PwmVector) -> bool {
        let mut helm = self.helm();
        if helm.auto_run == Some(run) {
            helm.target = target;
            true
        } else {
            false
        }
    }

    pub(crate) fn auto_cancelled(&self, run: u64) -> bool {
        self.helm().auto_run != Some(run)
    }

    /// Terminal step of an Auto run: neutral target and Auto cleared, but
    /// only if this run still owns the helm.
    pub(crate) fn finish_auto(&self, run: u64) -> bool {
        let mut helm = self.helm();
        if helm.auto_run == Some(run) {
            helm.auto_run = None;
            helm.target = PwmVector::NEUTRAL;
            true
        } else {
            false
        }
    }

    pub fn cancel_auto(&self) -> bool {
        self.helm().cancel_auto()
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(ThrustAllocationMatrix::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_priority() {
        let state = ControlState::default();
        assert_eq!(state.mode(), Mode::Manual);

        state.helm().set_semi_auto(Some(Direction::Left));
        assert_eq!(state.mode(), Mode::SemiAuto(Direction::Left));

        let run = state.helm().begin_auto();
        assert_eq!(state.mode(), Mode::Auto);

        assert!(state.finish_auto(run));
        assert_eq!(state.mode(), Mode::SemiAuto(Direction::Left));
    }

    #[test]
    fn test_stale_run_cannot_write() {
        let state = ControlState::default();
        let first = state.helm().begin_auto();
        assert!(state.cancel_auto());
        let second = state.helm().begin_auto();

        let pwm = PwmVector::new([1900; 8]);
        assert!(!state.write_auto_target(first, pwm));
        assert!(state.auto_cancelled(first));
        assert!(!state.finish_auto(first));
        assert_eq!(state.mode(), Mode::Auto);

        assert!(state.write_auto_target(second, pwm));
        assert_eq!(state.target(), pwm);
    }

    #[test]
    fn test_cancel_forces_neutral() {
        let state = ControlState::default();
        let run = state.helm().begin_auto();
        state.write_auto_target(run, PwmVector::new([1700; 8]));
        assert!(state.cancel_auto());
        assert!(state.target().is_neutral());
        assert!(!state.cancel_auto());
    }

    #[test]
    fn test_bad_matrix_keeps_previous() {
        let state = ControlState::default();
        let before = state.matrix();
        let rows = vec![vec![1.0, 0.0]; 8];
        assert!(state.replace_matrix_rows(&rows).is_err());
        assert_eq!(state.matrix(), before);

        let rows = vec![vec![1.0, 0.0, 0.0]; 8];
        assert!(state.replace_matrix_rows(&rows).is_ok());
        assert_eq!(state.matrix().rows()[4], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_direction_inputs() {
        assert_eq!(Direction::Left.inputs(), DofInputs::new(1.0, -1.0, 0.0));
        assert_eq!(Direction::Right.inputs(), DofInputs::new(1.0, 1.0, 0.0));
        assert_eq!(Direction::Forward.inputs(), DofInputs::new(1.0, 0.0, 0.0));
        assert_eq!(Direction::Down.inputs(), DofInputs::new(0.0, 0.0, -1.0));
    }
}
