#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerStatus {
    Stopped,
    Running,
    Paused,
}

/// What a single tick did to the timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// Not running (stopped or paused); nothing changed
    Idle,
    /// Counted down one second, still above zero
    Running,
    /// Reached zero on this tick; fires once per `start`
    Elapsed,
}

/// Rest countdown driven by an external 1 Hz tick.
///
/// The timer owns no thread and reads no clock; whoever owns it calls
/// [`RestTimer::tick`] once per elapsed second. This keeps the countdown
/// deterministic under test.
#[derive(Clone, Debug)]
pub struct RestTimer {
    remaining: u32,
    status: TimerStatus,
}

impl Default for RestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTimer {
    pub fn new() -> Self {
        Self {
            remaining: 0,
            status: TimerStatus::Stopped,
        }
    }

    /// Arm the countdown. A zero duration elapses on the next tick.
    pub fn start(&mut self, secs: u32) {
        self.remaining = secs;
        self.status = TimerStatus::Running;
    }

    pub fn pause(&mut self) -> bool {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.status == TimerStatus::Paused {
            self.status = TimerStatus::Running;
            true
        } else {
            false
        }
    }

    /// Stop silently; no `Elapsed` will be reported for the current run
    pub fn cancel(&mut self) {
        self.remaining = 0;
        self.status = TimerStatus::Stopped;
    }

    pub fn tick(&mut self) -> TimerEvent {
        if self.status != TimerStatus::Running {
            return TimerEvent::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.status = TimerStatus::Stopped;
            TimerEvent::Elapsed
        } else {
            TimerEvent::Running
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}
