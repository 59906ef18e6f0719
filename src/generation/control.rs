//! Stop/pause signal consulted between candidates

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Continue,
    Pause,
    Stop,
}

/// Source of external stop/pause requests
///
/// Polled once per candidate, never while a candidate is being evaluated.
pub trait ControlSignal: Send + Sync {
    fn poll(&self) -> ControlAction;
}

/// Never interrupts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoControl;

impl ControlSignal for NoControl {
    fn poll(&self) -> ControlAction {
        ControlAction::Continue
    }
}

const CONTINUE: u8 = 0;
const PAUSE: u8 = 1;
const STOP: u8 = 2;

/// Shared flag another thread (or a signal handler) can flip
#[derive(Debug, Clone, Default)]
pub struct ControlFlag {
    state: Arc<AtomicU8>,
}

impl ControlFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resume(&self) {
        self.state.store(CONTINUE, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.state.store(PAUSE, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.state.store(STOP, Ordering::SeqCst);
    }
}

impl ControlSignal for ControlFlag {
    fn poll(&self) -> ControlAction {
        match self.state.load(Ordering::SeqCst) {
            PAUSE => ControlAction::Pause,
            STOP => ControlAction::Stop,
            _ => ControlAction::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_clones_share_state() {
        let flag = ControlFlag::new();
        let handle = flag.clone();
        assert_eq!(flag.poll(), ControlAction::Continue);
        handle.pause();
        assert_eq!(flag.poll(), ControlAction::Pause);
        handle.stop();
        assert_eq!(flag.poll(), ControlAction::Stop);
        handle.resume();
        assert_eq!(NoControl.poll(), ControlAction::Continue);
        assert_eq!(flag.poll(), ControlAction::Continue);
    }
}
