/**
 * Switch Monitor
 *
 * Polls the sensor channel for lines of the form "1:<0|1>,2:<0|1>" and keeps
 * the shared switch state current. A line that does not decode is logged and
 * dropped; the previous state stays in place.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use super::state::{ControlState, SwitchState};
use crate::pubsub::Publisher;
use crate::uart::{parse_switch_line, Channel};

pub const DEFAULT_POLL: Duration = Duration::from_millis(50);

pub struct SwitchMonitor {
    state: Arc<ControlState>,
    channel: Arc<Channel>,
    publisher: Publisher<SwitchState>,
    poll: Duration,
}

impl SwitchMonitor {
    pub fn new(state: Arc<ControlState>, channel: Arc<Channel>, publisher: Publisher<SwitchState>) -> Self {
        Self {
            state,
            channel,
            publisher,
            poll: DEFAULT_POLL,
        }
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Decode one sensor line. Returns the new state if it was accepted.
    pub fn ingest_line(&self, line: &str) -> Option<SwitchState> {
        if line.trim().is_empty() {
            return None;
        }
        match parse_switch_line(line) {
            Ok(switches) => {
                if switches != self.state.switches() {
                    debug!(target: "switches", "left={} right={}", switches.left as u8, switches.right as u8);
                }
                self.state.set_switches(switches);
                self.publisher.publish(switches);
                Some(switches)
            }
            Err(e) => {
                warn!(target: "switches", "{}", e);
                None
            }
        }
    }

    /// Read at most one line from the channel
    pub fn poll_once(&self) -> Option<SwitchState> {
        match self.channel.read_line() {
            Ok(Some(line)) => self.ingest_line(&line),
            Ok(None) => None,
            Err(e) => {
                warn!(target: "switches", "read from {} failed: {}", self.channel.name(), e);
                None
            }
        }
    }

    pub fn run(&self, running: &AtomicBool) {
        info!(target: "switches", "switch monitor started on {}", self.channel.name());
        while running.load(Ordering::SeqCst) {
            self.poll_once();
            thread::sleep(self.poll);
        }
        info!(target: "switches", "switch monitor stopped");
    }

    pub fn spawn(self, running: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("switches".to_string())
            .spawn(move || self.run(&running))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{Subscriber, Topic};
    use crate::uart::mock::MockChannel;

    fn monitor(state: Arc<ControlState>) -> (SwitchMonitor, MockChannel, Arc<Topic<SwitchState>>) {
        let mock = MockChannel::new();
        let channel = Arc::new(Channel::new("/dev/switch_sound", Box::new(mock.clone())));
        let topic = Arc::new(Topic::new("/auv/switches", 16));
        let monitor = SwitchMonitor::new(state, channel, Publisher::new(Arc::clone(&topic)));
        (monitor, mock, topic)
    }

    #[test]
    fn test_valid_line_updates_and_publishes() {
        let state = Arc::new(ControlState::default());
        let (monitor, mock, topic) = monitor(Arc::clone(&state));
        let observer = Subscriber::new(Arc::clone(&topic));

        mock.push_incoming("1:1,2:0");
        assert_eq!(monitor.poll_once(), Some(SwitchState { left: true, right: false }));
        assert_eq!(state.switches(), SwitchState { left: true, right: false });
        assert_eq!(observer.latest_if_new(), Some(SwitchState { left: true, right: false }));
    }

    #[test]
    fn test_malformed_line_keeps_previous_state() {
        let state = Arc::new(ControlState::default());
        let (monitor, mock, topic) = monitor(Arc::clone(&state));

        mock.push_incoming("1:0,2:1");
        monitor.poll_once();
        for bad in ["1:1", "1:1,2:7", "noise", "1:1,2"] {
            mock.push_incoming(bad);
            assert_eq!(monitor.poll_once(), None);
            assert_eq!(state.switches(), SwitchState { left: false, right: true });
        }
        assert_eq!(topic.len(), 1);
    }

    #[test]
    fn test_timeout_and_read_error_are_quiet() {
        let state = Arc::new(ControlState::default());
        let (monitor, mock, topic) = monitor(Arc::clone(&state));

        assert_eq!(monitor.poll_once(), None);
        mock.fail_next_reads(1);
        assert_eq!(monitor.poll_once(), None);
        assert!(topic.is_empty());

        mock.push_incoming("1:1,2:1");
        assert_eq!(monitor.poll_once(), Some(SwitchState { left: true, right: true }));
    }

    #[test]
    fn test_run_consumes_lines_until_stopped() {
        let state = Arc::new(ControlState::default());
        let (monitor, mock, _topic) = monitor(Arc::clone(&state));
        mock.push_incoming("1:0,2:0");
        mock.push_incoming("1:1,2:0");

        let running = Arc::new(AtomicBool::new(true));
        let handle = monitor
            .with_poll(Duration::from_millis(1))
            .spawn(Arc::clone(&running))
            .unwrap();

        thread::sleep(Duration::from_millis(40));
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(state.switches(), SwitchState { left: true, right: false });
    }
}
