//! Welcome to `mpsim`!
//!
//! A discrete-event simulator of a single-CPU multiprogramming operating
//! system. Processes are read from a table, admitted into fixed memory
//! partitions, dispatched onto the CPU under a [`Policy`], and driven
//! through their lifecycle tick by tick. Every state change and every
//! memory change is handed to a [`Recorder`].

mod process;
mod memory;
mod policy;
mod engine;
mod events;
pub mod pcb;
pub mod io;
pub mod utils;

/// Imports, type aliases, traits ... in general
/// useful stuff that shall be needed in many places.
pub use crate::utils::*;

/// Our fundamental unit of interest. A [`Process`] is the simulator's
/// Process Control Block: everything the scheduler and the memory manager
/// need to know about one synthetic program.
///
/// The first six fields are fixed at load time. The rest is simulation
/// state and can only be changed from within the crate, through the
/// lifecycle methods of [`Process`] (see [`ProcessState`] for the legal
/// transitions).
///
/// > ***ATTENTION:*** [`cpu_used`](Process::cpu_used) never exceeds
/// > [`cpu_total`](Process::cpu_total), and the two are equal exactly when
/// > the process is [`Terminated`](ProcessState::Terminated). A process
/// > holds a partition iff it is `Ready`, `Running` or `Waiting`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Process {
    pub pid:            Pid,
    /// Memory the process needs, in the same units as partition capacities.
    pub size:           SimUnits,
    pub arrival:        SimUnits,
    pub cpu_total:      SimUnits,
    /// CPU time between two I/O requests. Zero means no I/O at all.
    pub io_freq:        SimUnits,
    pub io_dur:         SimUnits,
    state:              ProcessState,
    cpu_used:           SimUnits,
    // Reset every time the process enters `Waiting`.
    io_waited:          SimUnits,
    // Index into the partition table, never a reference.
    partition:          Option<usize>,
    // External priority. Lower is better, and it gets worse every
    // time the process is dispatched under EP.
    priority:           SimUnits,
}

/// Where a [`Process`] currently is in its life.
///
/// ```text
/// NOT_ARRIVED -> NEW -> READY -> RUNNING -> TERMINATED
///                         ^  \      |
///                         |   `-----+ (quantum expired)
///                         |         v
///                         `----- WAITING
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessState {
    NotArrived,
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

/// One fixed region of simulated memory.
///
/// Partitions are created once, from a list of capacities sorted from
/// largest to smallest, and never change size. Each one holds at most
/// one process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// 1-based ordinal, as printed in the memory status table.
    pub number:     usize,
    pub capacity:   SimUnits,
    occupant:       Option<Pid>,
    // Size of the occupant, kept here so that snapshots do not
    // need to visit the process table.
    used:           SimUnits,
}

/// A scheduling decision. Produced fresh for every dispatch and never
/// mutated afterwards.
///
/// [`slice`](ExecutionOrder::slice) is the *true* number of ticks the
/// process will run, that is, already capped at its next I/O boundary and
/// at its remaining CPU time. [`next`](ExecutionOrder::next) is the state
/// the process will be moved to once the slice is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionOrder {
    /// `None` means the CPU idles for one tick.
    pub pid:    Option<Pid>,
    pub slice:  SimUnits,
    pub next:   Option<ProcessState>,
}

pub use memory::{PartitionTable, MemorySnapshot};
pub use policy::{Policy, Mode, Selection, Strategy};
pub use engine::SimulationContext;
pub use events::{Transition, Recorder, Transcript, Span};
