/**
 * Ramp Scheduler
 *
 * Every tick (10 ms by default) moves each thruster's current PWM toward its
 * target by at most `step` units, writes one actuator line per thruster and
 * publishes the new current vector. A 400 us swing at step 8 takes exactly
 * 50 ticks.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};

use super::state::ControlState;
use super::thrust_mixer::{PwmVector, THRUSTER_COUNT};
use crate::pubsub::Publisher;
use crate::uart::{encode_thruster_frame, encode_thruster_line, Channel};

pub const DEFAULT_STEP: i32 = 8;
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Move `current` toward `target` by at most `step`, never past it
pub fn step_toward(current: i32, target: i32, step: i32) -> i32 {
    if current < target {
        (current + step).min(target)
    } else if current > target {
        (current - step).max(target)
    } else {
        current
    }
}

pub fn ramp_step(current: &PwmVector, target: &PwmVector, step: i32) -> PwmVector {
    let mut next = *current;
    for i in 0..THRUSTER_COUNT {
        next.set(i, step_toward(current.get(i), target.get(i), step));
    }
    next
}

/// Ticks until the slowest thruster reaches its target
pub fn ticks_to_converge(current: &PwmVector, target: &PwmVector, step: i32) -> u32 {
    (0..THRUSTER_COUNT)
        .map(|i| {
            let delta = (target.get(i) - current.get(i)).unsigned_abs();
            delta.div_ceil(step.max(1) as u32)
        })
        .max()
        .unwrap_or(0)
}

pub struct RampScheduler {
    state: Arc<ControlState>,
    channel: Arc<Channel>,
    publisher: Publisher<PwmVector>,
    step: i32,
    tick: Duration,
}

impl RampScheduler {
    pub fn new(state: Arc<ControlState>, channel: Arc<Channel>, publisher: Publisher<PwmVector>) -> Self {
        Self {
            state,
            channel,
            publisher,
            step: DEFAULT_STEP,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_rate(mut self, step: i32, tick: Duration) -> Self {
        self.step = step.max(1);
        self.tick = tick;
        self
    }

    /// One scheduler cycle. Returns the new current vector.
    pub fn tick(&self) -> PwmVector {
        let target = self.state.target();
        let next = ramp_step(&self.state.current(), &target, self.step);
        self.state.set_current(next);

        let mut failures = 0;
        for (i, pwm) in next.as_array().iter().enumerate() {
            // each line is its own channel operation; a failed line is dropped
            if let Err(e) = self.channel.write_line(&encode_thruster_line(i, *pwm)) {
                failures += 1;
                if failures == 1 {
                    warn!(target: "ramp", "write to {} failed for thruster {}: {}", self.channel.name(), i + 1, e);
                }
            }
        }
        if failures > 1 {
            warn!(target: "ramp", "{} of {} thruster writes failed this tick", failures, THRUSTER_COUNT);
        }

        self.publisher.publish(next);
        next
    }

    /// Send an all-neutral frame straight to the actuators, bypassing the ramp
    pub fn stop_thrusters(&self) {
        for line in encode_thruster_frame(&PwmVector::NEUTRAL) {
            if let Err(e) = self.channel.write_line(&line) {
                warn!(target: "ramp", "neutral frame write failed: {}", e);
            }
        }
        self.state.set_current(PwmVector::NEUTRAL);
        self.publisher.publish(PwmVector::NEUTRAL);
    }

    /// Tick at a fixed rate until `running` clears, then stop the thrusters
    pub fn run(&self, running: &AtomicBool) {
        info!(target: "ramp", "ramp scheduler started (step {}, tick {:?})", self.step, self.tick);
        let mut next_tick = Instant::now();

        while running.load(Ordering::SeqCst) {
            self.tick();

            next_tick += self.tick;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                // fell behind, do not try to catch up with a burst of ticks
                next_tick = now;
            }
        }

        info!(target: "ramp", "stopping thrusters");
        self.stop_thrusters();
    }

    pub fn spawn(self, running: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("ramp".to_string())
            .spawn(move || self.run(&running))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::Topic;
    use crate::uart::mock::MockChannel;
    use crate::uart::parse_thruster_line;
    use proptest::prelude::*;

    fn scheduler(state: Arc<ControlState>) -> (RampScheduler, MockChannel, Arc<Topic<PwmVector>>) {
        let mock = MockChannel::new();
        let channel = Arc::new(Channel::new("/dev/thrusters", Box::new(mock.clone())));
        let topic = Arc::new(Topic::new("/auv/pwm", 64));
        let ramp = RampScheduler::new(state, channel, Publisher::new(Arc::clone(&topic)));
        (ramp, mock, topic)
    }

    #[test]
    fn test_step_toward_never_overshoots() {
        assert_eq!(step_toward(1500, 1900, 8), 1508);
        assert_eq!(step_toward(1896, 1900, 8), 1900);
        assert_eq!(step_toward(1500, 1100, 8), 1492);
        assert_eq!(step_toward(1103, 1100, 8), 1100);
        assert_eq!(step_toward(1500, 1500, 8), 1500);
    }

    #[test]
    fn test_full_range_takes_fifty_ticks() {
        let state = Arc::new(ControlState::default());
        state.helm().set_target(PwmVector::new([1900; 8]));
        let (ramp, _mock, _topic) = scheduler(Arc::clone(&state));

        let mut last_gap = 400;
        for tick in 1..=50 {
            let current = ramp.tick();
            let gap = 1900 - current.get(0);
            assert!(gap <= last_gap && gap >= 0);
            last_gap = gap;
            if tick < 50 {
                assert!(current.get(0) < 1900, "converged early at tick {}", tick);
            }
        }
        assert_eq!(state.current(), PwmVector::new([1900; 8]));
        assert_eq!(ramp.tick(), PwmVector::new([1900; 8]));
    }

    #[test]
    fn test_tick_writes_one_line_per_thruster_and_publishes() {
        let state = Arc::new(ControlState::default());
        state.helm().set_target(PwmVector::new([1100, 1900, 1500, 1500, 1500, 1500, 1500, 1504]));
        let (ramp, mock, topic) = scheduler(Arc::clone(&state));

        ramp.tick();
        let lines = mock.take_written();
        assert_eq!(lines, vec!["1:1492\n", "2:1508\n", "3:1500\n", "4:1500\n", "5:1500\n", "6:1500\n", "7:1500\n", "8:1504\n"]);
        assert_eq!(topic.len(), 1);

        ramp.tick();
        let decoded: Vec<(usize, i32)> = mock
            .take_written()
            .iter()
            .filter_map(|line| parse_thruster_line(line))
            .collect();
        let current = state.current();
        assert_eq!(decoded.len(), THRUSTER_COUNT);
        for (i, pwm) in decoded {
            assert_eq!(pwm, current.get(i));
        }
        assert_eq!(current.get(0), 1484);
        assert_eq!(topic.len(), 2);
    }

    #[test]
    fn test_write_failure_is_skipped_not_fatal() {
        let state = Arc::new(ControlState::default());
        state.helm().set_target(PwmVector::new([1900; 8]));
        let (ramp, mock, topic) = scheduler(Arc::clone(&state));

        mock.fail_next_writes(3);
        let current = ramp.tick();
        assert_eq!(current.get(0), 1508);
        assert_eq!(mock.take_written().len(), 5);
        assert_eq!(topic.len(), 1);

        ramp.tick();
        assert_eq!(mock.take_written().len(), 8);
        assert_eq!(state.current().get(0), 1516);
    }

    #[test]
    fn test_run_stops_with_neutral_frame() {
        let state = Arc::new(ControlState::default());
        state.helm().set_target(PwmVector::new([1700; 8]));
        let (ramp, mock, _topic) = scheduler(Arc::clone(&state));
        let running = Arc::new(AtomicBool::new(true));
        let handle = ramp.with_rate(8, Duration::from_millis(1)).spawn(Arc::clone(&running)).unwrap();

        thread::sleep(Duration::from_millis(30));
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        let written = mock.written();
        assert_eq!(&written[written.len() - 8..], encode_thruster_frame(&PwmVector::NEUTRAL).as_slice());
        assert!(state.current().is_neutral());
    }

    #[test]
    fn test_ticks_to_converge() {
        let a = PwmVector::NEUTRAL;
        assert_eq!(ticks_to_converge(&a, &PwmVector::new([1900; 8]), 8), 50);
        assert_eq!(ticks_to_converge(&a, &PwmVector::new([1501; 8]), 8), 1);
        assert_eq!(ticks_to_converge(&a, &a, 8), 0);
    }

    proptest! {
        #[test]
        fn prop_converges_in_ceil_ticks(
            start in proptest::collection::vec(1100i32..=1900, 8),
            goal in proptest::collection::vec(1100i32..=1900, 8),
        ) {
            let mut current = PwmVector::new(start.clone().try_into().unwrap());
            let target = PwmVector::new(goal.clone().try_into().unwrap());
            let expected = ticks_to_converge(&current, &target, DEFAULT_STEP);

            for _ in 0..expected {
                let next = ramp_step(&current, &target, DEFAULT_STEP);
                for i in 0..THRUSTER_COUNT {
                    let before = (target.get(i) - current.get(i)).abs();
                    let after = (target.get(i) - next.get(i)).abs();
                    prop_assert!(after <= before);
                    prop_assert!((next.get(i) - current.get(i)).abs() <= DEFAULT_STEP);
                }
                current = next;
            }
            prop_assert_eq!(current, target);
        }
    }
}
