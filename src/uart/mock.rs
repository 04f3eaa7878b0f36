//in-memory DeviceChannel for host tests and dry runs
//clones share the same state, so a test keeps one handle to script input
//and inspect output while the controller owns another

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::DeviceChannel;
use crate::auv::state::lock;

#[derive(Default)]
struct MockState{
    incoming: VecDeque<String>,
    written: Vec<String>,
    failing_writes: usize,
    failing_reads: usize,
}

#[derive(Clone, Default)]
pub struct MockChannel{
    state: Arc<Mutex<MockState>>,
}

impl MockChannel{
    pub fn new() -> Self{
        Self::default()
    }

    pub fn push_incoming(&self, line: &str){
        lock(&self.state).incoming.push_back(line.to_string());
    }

    pub fn written(&self) -> Vec<String>{
        lock(&self.state).written.clone()
    }

    pub fn take_written(&self) -> Vec<String>{
        std::mem::take(&mut lock(&self.state).written)
    }

    //the next `count` writes fail with BrokenPipe
    pub fn fail_next_writes(&self, count: usize){
        lock(&self.state).failing_writes = count;
    }

    //the next `count` reads fail with an I/O error
    pub fn fail_next_reads(&self, count: usize){
        lock(&self.state).failing_reads = count;
    }
}

impl DeviceChannel for MockChannel{
    fn write_line(&mut self, line: &str) -> io::Result<()>{
        let mut state = lock(&self.state);
        if state.failing_writes > 0{
            state.failing_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state.written.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>>{
        let mut state = lock(&self.state);
        if state.failing_reads > 0{
            state.failing_reads -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "mock read failure"));
        }
        Ok(state.incoming.pop_front())
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_failure_injection(){
        let mut mock = MockChannel::new();
        mock.fail_next_writes(1);
        assert!(mock.write_line("a\n").is_err());
        assert!(mock.write_line("b\n").is_ok());
        assert_eq!(mock.take_written(), vec!["b\n".to_string()]);
        assert!(mock.written().is_empty());

        mock.fail_next_reads(1);
        mock.push_incoming("x");
        assert!(mock.read_line().is_err());
        assert_eq!(mock.read_line().unwrap(), Some("x".to_string()));
    }
}
