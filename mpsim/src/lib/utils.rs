pub use std::{
    collections::VecDeque,
    fmt,
    fs::File,
    hash::BuildHasherDefault,
    io::{BufRead, BufReader, BufWriter, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
pub use thiserror::Error;
pub use itertools::Itertools;
pub use clap::{Parser, ValueEnum};
pub use indexmap::IndexMap;
pub use log::{debug, info, warn};
use ahash::AHasher;

pub use crate::{ExecutionOrder, Partition, Process, ProcessState};

/// The unit for measuring simulated time *and* memory. `mpsim` does not
/// care about semantics: a tick is whatever the input table says it is,
/// and so is a unit of memory.
pub type SimUnits = usize;

/// Process identifiers are taken verbatim from the input table.
pub type Pid = u32;

/// The process arena. Insertion-ordered (i.e., in input order) and
/// addressable both by pid and by position.
pub type ProcessTable = IndexMap<Pid, Process, BuildHasherDefault<AHasher>>;

/// Memory layout used when nobody says otherwise. Sorted from largest to
/// smallest, which the allocator depends on.
pub const PARTITION_SIZES: [SimUnits; 6] = [40, 25, 15, 10, 8, 2];

pub const DEFAULT_QUANTUM: SimUnits = 100;

/// Defines the interface for reading process tables.
///
/// [`crate::pcb::PcbParser`] reads the comma/space separated text format.
/// Other sources only need to implement this trait.
pub trait TableGen<T> {
    /// Either every record is returned, in input order, or the
    /// first problem found.
    fn read_processes(&self) -> Result<Vec<Process>, ParseError>;
    /// Spawns a single [`Process`] from whatever a record looks like.
    fn gen_single(&self, d: T, line: usize) -> Result<Process, ParseError>;
}

/// Appears while turning some input into a [`ProcessTable`].
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot read process table: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Malformed {
        line:   usize,
        reason: String,
    },
    #[error("line {line}: pid {pid} appears more than once")]
    DuplicatePid {
        line:   usize,
        pid:    Pid,
    },
    #[error("process table is empty")]
    Empty,
}

/// Things that can go wrong while setting up or running a simulation.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    #[error("at least one memory partition is needed")]
    NoPartitions,
    #[error("partition {number} has zero capacity")]
    EmptyPartition {
        number: usize,
    },
    #[error("partition sizes must be sorted from largest to smallest ({prev} is followed by {next})")]
    UnsortedPartitions {
        prev:   SimUnits,
        next:   SimUnits,
    },
    #[error("process table maps key {key} to pid {pid}")]
    PidMismatch {
        key:    Pid,
        pid:    Pid,
    },
    #[error("stalled at t={time}: processes {pids:?} can never be admitted to memory")]
    Stalled {
        time:   SimUnits,
        pids:   Vec<Pid>,
    },
    #[error("tick limit of {limit} exceeded")]
    TickLimit {
        limit:  SimUnits,
    },
}
