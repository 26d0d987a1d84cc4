use crate::utils::*;
use crate::Transition;

impl Process {
    /// Creates a process that has not arrived yet, with zeroed counters
    /// and the best possible priority.
    pub fn new(
        pid:        Pid,
        size:       SimUnits,
        arrival:    SimUnits,
        cpu_total:  SimUnits,
        io_freq:    SimUnits,
        io_dur:     SimUnits,
    ) -> Self {
        Self {
            pid,
            size,
            arrival,
            cpu_total,
            io_freq,
            io_dur,
            state:      ProcessState::NotArrived,
            cpu_used:   0,
            io_waited:  0,
            partition:  None,
            priority:   0,
        }
    }

    pub fn with_priority(mut self, priority: SimUnits) -> Self {
        self.priority = priority;
        self
    }

    pub fn state(&self) -> ProcessState { self.state }

    pub fn cpu_used(&self) -> SimUnits { self.cpu_used }

    pub fn io_waited(&self) -> SimUnits { self.io_waited }

    /// Index of the partition currently holding the process, if any.
    pub fn partition(&self) -> Option<usize> { self.partition }

    pub fn priority(&self) -> SimUnits { self.priority }

    pub fn remaining(&self) -> SimUnits {
        self.cpu_total - self.cpu_used
    }

    /// CPU ticks left until the next I/O request. `None` for processes
    /// that never do I/O.
    pub fn until_io(&self) -> Option<SimUnits> {
        if self.io_freq == 0 {
            None
        } else {
            Some(self.io_freq - self.cpu_used % self.io_freq)
        }
    }

    /// Returns `true` if the process still has business with the
    /// simulator.
    pub fn is_live(&self) -> bool {
        self.state != ProcessState::Terminated
    }

    /// Moves the process to `to` at simulated time `time`.
    ///
    /// # Panics
    ///
    /// If `to` is not reachable from the current state, or if the move
    /// would break the CPU accounting. Both are bugs in the caller.
    pub fn transition(&mut self, to: ProcessState, time: SimUnits) -> Transition {
        let from = self.state;
        assert!(
            from.can_become(to),
            "pid {}: illegal transition {} -> {} at t={}",
            self.pid, from, to, time
        );
        match to {
            ProcessState::Waiting       => {
                assert!(self.cpu_used < self.cpu_total, "pid {}: waiting with no CPU left", self.pid);
                self.io_waited = 0;
            },
            ProcessState::Terminated    => {
                assert_eq!(self.cpu_used, self.cpu_total, "pid {}: terminated early", self.pid);
            },
            ProcessState::Ready | ProcessState::Running => {
                assert!(self.partition.is_some(), "pid {}: {} without memory", self.pid, to);
            },
            _   => {}
        }
        self.state = to;

        Transition { time, pid: self.pid, from, to }
    }

    /// Turns a strategy's candidate slice into a complete [`ExecutionOrder`]:
    /// the slice gets capped at the remaining CPU time and at the next
    /// I/O boundary, and the state after the slice is worked out.
    ///
    /// Completion wins over I/O when both boundaries coincide.
    pub fn plan(&self, candidate: SimUnits) -> ExecutionOrder {
        let mut slice = candidate.min(self.remaining());
        if let Some(io) = self.until_io() {
            slice = slice.min(io);
        }
        let after = self.cpu_used + slice;
        let next = if after == self.cpu_total {
            ProcessState::Terminated
        } else if self.io_freq != 0 && after % self.io_freq == 0 {
            ProcessState::Waiting
        } else {
            ProcessState::Ready
        };

        ExecutionOrder { pid: Some(self.pid), slice, next: Some(next) }
    }

    pub(crate) fn consume_tick(&mut self) {
        assert_eq!(self.state, ProcessState::Running);
        assert!(self.cpu_used < self.cpu_total, "pid {}: CPU overrun", self.pid);
        self.cpu_used += 1;
    }

    /// One more tick spent on I/O. Returns `true` once the whole
    /// duration has been waited.
    pub(crate) fn wait_tick(&mut self) -> bool {
        assert_eq!(self.state, ProcessState::Waiting);
        self.io_waited += 1;
        self.io_waited >= self.io_dur
    }

    pub(crate) fn age(&mut self) {
        self.priority += 1;
    }

    pub(crate) fn bind(&mut self, partition: usize) {
        assert!(self.partition.is_none(), "pid {} already holds memory", self.pid);
        self.partition = Some(partition);
    }

    pub(crate) fn unbind(&mut self) -> Option<usize> {
        self.partition.take()
    }
}

impl ProcessState {
    /// The lifecycle, in one place. Anything not listed is illegal.
    pub fn can_become(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (NotArrived, New)
                | (New, Ready)
                | (Ready, Running)
                | (Running, Ready)
                | (Running, Waiting)
                | (Running, Terminated)
                | (Waiting, Ready)
        )
    }

    /// Returns `true` for the states in which a process owns a partition.
    pub fn holds_memory(self) -> bool {
        matches!(self, ProcessState::Ready | ProcessState::Running | ProcessState::Waiting)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::NotArrived    => "NOT_ARRIVED",
            ProcessState::New           => "NEW",
            ProcessState::Ready         => "READY",
            ProcessState::Running       => "RUNNING",
            ProcessState::Waiting       => "WAITING",
            ProcessState::Terminated    => "TERMINATED",
        };
        // `pad` so that table writers can right-align state names.
        f.pad(name)
    }
}

impl ExecutionOrder {
    /// Nothing is ready: the CPU sits out one tick.
    pub fn idle() -> Self {
        Self { pid: None, slice: 1, next: None }
    }

    pub fn is_idle(&self) -> bool {
        self.pid.is_none()
    }
}
