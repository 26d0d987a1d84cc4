use crate::utils::*;
use crate::MemorySnapshot;

/// One state change of one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub time:   SimUnits,
    pub pid:    Pid,
    pub from:   ProcessState,
    pub to:     ProcessState,
}

/// The boundary between the simulator and whoever wants to know what
/// happened. Recorders are handed events in the order they occur; they
/// must not assume anything about what comes next.
pub trait Recorder {
    fn transition(&mut self, t: &Transition);
    fn memory(&mut self, snap: &MemorySnapshot);
}

/// Discards everything.
impl Recorder for () {
    fn transition(&mut self, _: &Transition) {}
    fn memory(&mut self, _: &MemorySnapshot) {}
}

impl<R: Recorder + ?Sized> Recorder for &mut R {
    fn transition(&mut self, t: &Transition) {
        (**self).transition(t)
    }

    fn memory(&mut self, snap: &MemorySnapshot) {
        (**self).memory(snap)
    }
}

/// Feeds both members, left first.
impl<A: Recorder, B: Recorder> Recorder for (A, B) {
    fn transition(&mut self, t: &Transition) {
        self.0.transition(t);
        self.1.transition(t);
    }

    fn memory(&mut self, snap: &MemorySnapshot) {
        self.0.memory(snap);
        self.1.memory(snap);
    }
}

/// A contiguous stretch of CPU time given to one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub pid:    Pid,
    pub start:  SimUnits,
    pub end:    SimUnits,
}

/// Keeps every event in memory. Used by tests and by anything that
/// analyzes a run after the fact.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    pub transitions:    Vec<Transition>,
    pub snapshots:      Vec<MemorySnapshot>,
}

impl Recorder for Transcript {
    fn transition(&mut self, t: &Transition) {
        self.transitions.push(*t);
    }

    fn memory(&mut self, snap: &MemorySnapshot) {
        self.snapshots.push(snap.clone());
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// All transitions of `pid`, in order.
    pub fn of(&self, pid: Pid) -> impl Iterator<Item = &Transition> + '_ {
        self.transitions
            .iter()
            .filter(move |t| t.pid == pid)
    }

    /// Reassembles CPU occupation from `Running` entries and exits.
    pub fn running_spans(&self) -> Vec<Span> {
        let mut res = vec![];
        let mut open: Option<(Pid, SimUnits)> = None;
        for t in &self.transitions {
            if t.to == ProcessState::Running {
                assert!(open.is_none(), "pid {} dispatched while CPU busy", t.pid);
                open = Some((t.pid, t.time));
            } else if t.from == ProcessState::Running {
                match open.take() {
                    Some((pid, start)) if pid == t.pid  => {
                        res.push(Span { pid, start, end: t.time });
                    },
                    _   => { panic!("pid {} left the CPU without holding it", t.pid); }
                }
            }
        }

        res
    }

    /// Time of the last recorded event.
    pub fn makespan(&self) -> SimUnits {
        self.transitions
            .last()
            .map(|t| t.time)
            .unwrap_or(0)
    }
}
