use crate::utils::*;

/// How the next process is picked. Chosen once, before the run starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    /// First come, first served. Ties go to the smaller pid.
    Fcfs,
    /// External priority with aging: lowest value wins, and every
    /// dispatch makes the winner's value one worse.
    Ep,
    /// Round robin over the ready queue with a fixed quantum.
    RoundRobin {
        quantum: NonZeroUsize,
    },
}

/// What the candidates are being picked *for*.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Candidates are `New` processes competing for a partition.
    Admission,
    /// Candidates are `Ready` processes competing for the CPU, in
    /// ready-queue order.
    Execution,
}

/// A strategy's raw answer. [`Process::plan`] turns it into an
/// [`ExecutionOrder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub pid:    Pid,
    /// Candidate slice length, before any capping. Zero in
    /// [`Mode::Admission`], where it means nothing.
    pub slice:  SimUnits,
}

/// Command-line face of [`Policy`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Strategy {
    /// First come, first served
    Fcfs,
    /// External priority
    Ep,
    /// Round robin
    Rr,
}

impl Strategy {
    pub fn into_policy(self, quantum: NonZeroUsize) -> Policy {
        match self {
            Strategy::Fcfs  => Policy::Fcfs,
            Strategy::Ep    => Policy::Ep,
            Strategy::Rr    => Policy::RoundRobin { quantum },
        }
    }
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::Fcfs                => "FCFS",
            Policy::Ep                  => "EP",
            Policy::RoundRobin { .. }   => "RR",
        }
    }

    /// Picks one of `candidates`, or nothing if there are none.
    ///
    /// Outside of [`Mode::Execution`] every policy behaves like FCFS.
    pub fn select_next(&self, candidates: &[&Process], mode: Mode) -> Option<Selection> {
        if let Mode::Admission = mode {
            return first_come(candidates)
                .map(|p| Selection { pid: p.pid, slice: 0 });
        }
        match self {
            Policy::Fcfs    => {
                first_come(candidates)
                    .map(|p| Selection { pid: p.pid, slice: burst(p) })
            },
            Policy::Ep      => {
                // `min_by_key` keeps the first of equal elements, i.e.,
                // the one closest to the head of the ready queue.
                candidates.iter()
                    .min_by_key(|p| p.priority())
                    .map(|p| Selection { pid: p.pid, slice: burst(p) })
            },
            Policy::RoundRobin { quantum }  => {
                candidates.first()
                    .map(|p| Selection { pid: p.pid, slice: quantum.get() })
            },
        }
    }

    /// Returns `true` if dispatching should age the chosen process.
    pub fn ages(&self) -> bool {
        matches!(self, Policy::Ep)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::RoundRobin { quantum }  => write!(f, "RR(q={})", quantum),
            _                               => f.write_str(self.name()),
        }
    }
}

fn first_come<'a>(candidates: &[&'a Process]) -> Option<&'a Process> {
    candidates.iter()
        .copied()
        .min_by_key(|p| (p.arrival, p.pid))
}

// Non-preemptive policies run a process up to its next I/O request.
// Processes without I/O run to completion.
fn burst(p: &Process) -> SimUnits {
    if p.io_freq == 0 { p.remaining() } else { p.io_freq }
}
