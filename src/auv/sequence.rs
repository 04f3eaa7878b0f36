/**
 * Auto-Sequence State Machine
 *
 * Timed docking / surfacing routine:
 *   PushDescend -> Settle -> { SeekLeft -> StopLeft -> SeekRight -> StopRight -> Surface } x N -> Terminal
 *
 * `AutoSequence` is a pure state machine advanced by `poll(now, switches,
 * cancelled)`; `run_sequence` drives it from a thread at the poll interval
 * and writes each phase's target through the shared state. Cancellation is
 * checked at every poll, so it takes effect within one poll interval.
 */

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::state::{ControlState, SwitchState};
use super::thrust_mixer::{DofInputs, PwmVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoPhase {
    PushDescend,
    Settle,
    SeekLeft,
    StopLeft,
    SeekRight,
    StopRight,
    Surface,
    Terminal,
}

/// How a seek phase decides its switch has been confirmed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmPolicy {
    /// The switch must read true on every poll for the whole window; a false
    /// reading restarts the window.
    #[default]
    Continuous,
    /// The window is timed from entering the seek phase; any true reading
    /// after it has elapsed confirms, regardless of earlier false readings.
    SinceSeekStart,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceTimings {
    pub push_descend: Duration,
    pub settle: Duration,
    pub confirm: Duration,
    pub stop: Duration,
    pub surface: Duration,
    pub surface_cap: u32,
    pub poll: Duration,
    pub confirm_policy: ConfirmPolicy,
}

impl Default for SequenceTimings {
    fn default() -> Self {
        Self {
            push_descend: Duration::from_millis(3000),
            settle: Duration::from_millis(1000),
            confirm: Duration::from_millis(1000),
            stop: Duration::from_millis(5000),
            surface: Duration::from_millis(300),
            surface_cap: 5,
            poll: Duration::from_millis(50),
            confirm_policy: ConfirmPolicy::Continuous,
        }
    }
}

/// What a phase asks of the thrusters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseCommand {
    Drive(DofInputs),
    Neutral,
}

impl AutoPhase {
    pub fn command(&self) -> PhaseCommand {
        match self {
            AutoPhase::PushDescend => PhaseCommand::Drive(DofInputs::new(1.0, 0.0, -1.0)),
            AutoPhase::SeekLeft => PhaseCommand::Drive(DofInputs::new(1.0, -1.0, 0.0)),
            AutoPhase::SeekRight => PhaseCommand::Drive(DofInputs::new(1.0, 1.0, 0.0)),
            AutoPhase::Surface => PhaseCommand::Drive(DofInputs::new(0.0, 0.0, 1.0)),
            AutoPhase::Settle | AutoPhase::StopLeft | AutoPhase::StopRight | AutoPhase::Terminal => {
                PhaseCommand::Neutral
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutoSequence {
    timings: SequenceTimings,
    phase: AutoPhase,
    phase_started: Instant,
    confirm_since: Option<Instant>,
    iterations: u32,
}

impl AutoSequence {
    pub fn new(timings: SequenceTimings, now: Instant) -> Self {
        Self {
            timings,
            phase: AutoPhase::PushDescend,
            phase_started: now,
            confirm_since: None,
            iterations: 0,
        }
    }

    pub fn phase(&self) -> AutoPhase {
        self.phase
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn is_finished(&self) -> bool {
        self.phase == AutoPhase::Terminal
    }

    pub fn command(&self) -> PhaseCommand {
        self.phase.command()
    }

    fn enter(&mut self, phase: AutoPhase, now: Instant) -> Option<AutoPhase> {
        self.phase = phase;
        self.phase_started = now;
        self.confirm_since = None;
        Some(phase)
    }

    fn confirmed(&mut self, now: Instant, switch: bool) -> bool {
        match self.timings.confirm_policy {
            ConfirmPolicy::Continuous => {
                if switch {
                    let since = *self.confirm_since.get_or_insert(now);
                    now.duration_since(since) >= self.timings.confirm
                } else {
                    self.confirm_since = None;
                    false
                }
            }
            ConfirmPolicy::SinceSeekStart => {
                switch && now.duration_since(self.phase_started) >= self.timings.confirm
            }
        }
    }

    /// Either start another seek loop or stop, depending on the surface count
    fn next_loop(&mut self, now: Instant) -> Option<AutoPhase> {
        if self.iterations >= self.timings.surface_cap {
            self.enter(AutoPhase::Terminal, now)
        } else {
            self.enter(AutoPhase::SeekLeft, now)
        }
    }

    /// Advance by at most one phase. Returns the new phase on a transition.
    pub fn poll(&mut self, now: Instant, switches: SwitchState, cancelled: bool) -> Option<AutoPhase> {
        if self.phase == AutoPhase::Terminal {
            return None;
        }
        if cancelled {
            return self.enter(AutoPhase::Terminal, now);
        }

        let elapsed = now.duration_since(self.phase_started);
        let t = self.timings;
        let phase = self.phase;

        match phase {
            AutoPhase::PushDescend if elapsed >= t.push_descend => self.enter(AutoPhase::Settle, now),
            AutoPhase::Settle if elapsed >= t.settle => self.next_loop(now),
            AutoPhase::SeekLeft if self.confirmed(now, switches.left) => {
                info!(target: "sequence", "left switch confirmed");
                self.enter(AutoPhase::StopLeft, now)
            }
            AutoPhase::StopLeft if elapsed >= t.stop => self.enter(AutoPhase::SeekRight, now),
            AutoPhase::SeekRight if self.confirmed(now, switches.right) => {
                info!(target: "sequence", "right switch confirmed");
                self.enter(AutoPhase::StopRight, now)
            }
            AutoPhase::StopRight if elapsed >= t.stop => self.enter(AutoPhase::Surface, now),
            AutoPhase::Surface if elapsed >= t.surface => {
                self.iterations += 1;
                self.next_loop(now)
            }
            _ => None,
        }
    }
}

fn phase_target(state: &ControlState, command: PhaseCommand) -> PwmVector {
    match command {
        PhaseCommand::Drive(inputs) => state.matrix().allocate(&inputs),
        PhaseCommand::Neutral => PwmVector::NEUTRAL,
    }
}

/// Drive one Auto run to completion. Returns once the run reaches Terminal,
/// either naturally or because its generation was retired.
pub fn run_sequence(state: &ControlState, run: u64, timings: SequenceTimings) {
    info!(target: "sequence", "Auto mode started (run {})", run);
    let mut sequence = AutoSequence::new(timings, Instant::now());
    state.write_auto_target(run, phase_target(state, sequence.command()));

    while !sequence.is_finished() {
        thread::sleep(timings.poll);

        let cancelled = state.auto_cancelled(run);
        if let Some(phase) = sequence.poll(Instant::now(), state.switches(), cancelled) {
            debug!(target: "sequence", "phase {:?} (surfaced {} times)", phase, sequence.iterations());
            if phase != AutoPhase::Terminal {
                state.write_auto_target(run, phase_target(state, sequence.command()));
            }
        }
    }

    if state.finish_auto(run) {
        info!(target: "sequence", "Auto mode stopped (run {})", run);
    } else {
        info!(target: "sequence", "Auto run {} cancelled", run);
    }
}

pub fn spawn_sequence(state: Arc<ControlState>, run: u64, timings: SequenceTimings) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("auto-sequence-{}", run))
        .spawn(move || run_sequence(&state, run, timings))
}
