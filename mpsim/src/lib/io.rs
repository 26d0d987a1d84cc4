use crate::utils::*;
use crate::{MemorySnapshot, Policy, Recorder, Transition};
use log::{LevelFilter, Metadata, Record, SetLoggerError};

/// Knobs of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub policy:     Policy,
    /// Capacities, largest first.
    pub partitions: Vec<SimUnits>,
    /// Abort the run once the clock goes past this value.
    pub max_ticks:  Option<SimUnits>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy:     Policy::Fcfs,
            partitions: PARTITION_SIZES.to_vec(),
            max_ticks:  None,
        }
    }
}

impl Config {
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_partitions(mut self, partitions: &[SimUnits]) -> Self {
        self.partitions = partitions.to_vec();
        self
    }

    pub fn with_max_ticks(mut self, limit: SimUnits) -> Self {
        self.max_ticks = Some(limit);
        self
    }
}

//---START TRANSCRIPT WRITERS
// Both writers produce fixed-width text tables. `Recorder` methods cannot
// fail, so the first write error is kept aside and returned by `finish`.

const EXEC_RULE: &str = "+---------------------------------------------------------+";
const MEM_RULE: &str = "+-----------------------------------------------------------------------------------------+";

/// Writes the execution table: one row per state transition.
pub struct ExecutionTable<W: Write> {
    out:        W,
    started:    bool,
    error:      Option<std::io::Error>,
}

impl<W: Write> ExecutionTable<W> {
    pub fn new(out: W) -> Self {
        Self { out, started: false, error: None }
    }

    fn header(&mut self) -> std::io::Result<()> {
        if !self.started {
            self.started = true;
            writeln!(self.out, "{EXEC_RULE}")?;
            writeln!(
                self.out,
                "| {:>18} | {:>10} | {:>9} | {:>9} |",
                "Time of Transition", "PID", "Old State", "New State"
            )?;
            writeln!(self.out, "{EXEC_RULE}")?;
        }
        Ok(())
    }

    fn row(&mut self, t: &Transition) -> std::io::Result<()> {
        self.header()?;
        writeln!(
            self.out,
            "| {:>18} | {:>10} | {:>9} | {:>9} |",
            t.time, t.pid, t.from, t.to
        )
    }

    /// Closes the table and hands the sink back.
    pub fn finish(mut self) -> std::io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.header()?;
        writeln!(self.out, "{EXEC_RULE}")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> Recorder for ExecutionTable<W> {
    fn transition(&mut self, t: &Transition) {
        if self.error.is_none() {
            if let Err(e) = self.row(t) {
                self.error = Some(e);
            }
        }
    }

    fn memory(&mut self, _: &MemorySnapshot) {}
}

/// Writes the memory status table: one row per admission or
/// reclamation. Free partitions are printed as `-1`.
pub struct MemoryTable<W: Write> {
    out:        W,
    started:    bool,
    error:      Option<std::io::Error>,
}

impl<W: Write> MemoryTable<W> {
    pub fn new(out: W) -> Self {
        Self { out, started: false, error: None }
    }

    fn header(&mut self) -> std::io::Result<()> {
        if !self.started {
            self.started = true;
            writeln!(self.out, "{MEM_RULE}")?;
            writeln!(self.out, "| Time of Event | Memory Used | Partitions State | Total Free Memory | Usable Free Memory |")?;
            writeln!(self.out, "{MEM_RULE}")?;
        }
        Ok(())
    }

    fn row(&mut self, snap: &MemorySnapshot) -> std::io::Result<()> {
        self.header()?;
        let occupants = snap.occupants
            .iter()
            .map(|o| match o {
                Some(pid)   => pid.to_string(),
                None        => String::from("-1"),
            })
            .join(", ");
        writeln!(
            self.out,
            "| {:>13} | {:>11} | {} | {:>17} | {:>18} |",
            snap.time, snap.allocated, occupants, snap.total_free, snap.usable_free
        )
    }

    pub fn finish(mut self) -> std::io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.header()?;
        writeln!(self.out, "{MEM_RULE}")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> Recorder for MemoryTable<W> {
    fn transition(&mut self, _: &Transition) {}

    fn memory(&mut self, snap: &MemorySnapshot) {
        if self.error.is_none() {
            if let Err(e) = self.row(snap) {
                self.error = Some(e);
            }
        }
    }
}
//---END TRANSCRIPT WRITERS

/// Minimal `log` backend for the binaries. Everything goes to stderr,
/// so that stdout stays clean for results.
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Installs the console logger. `verbosity` counts `-v` flags:
/// 0 is warnings only, 1 adds info, 2 and up adds debug.
pub fn init_logger(verbosity: u8) -> Result<(), SetLoggerError> {
    let level = match verbosity {
        0   => LevelFilter::Warn,
        1   => LevelFilter::Info,
        _   => LevelFilter::Debug,
    };
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartitionTable;

    #[test]
    fn execution_rows() {
        let mut table = ExecutionTable::new(Vec::new());
        table.transition(&Transition {
            time: 12,
            pid: 4,
            from: ProcessState::Ready,
            to: ProcessState::Running,
        });
        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], EXEC_RULE);
        assert_eq!(lines[3], "|                 12 |          4 |     READY |   RUNNING |");
        assert_eq!(lines[4], EXEC_RULE);
        // Same width as the rule.
        assert_eq!(lines[1].len(), EXEC_RULE.len());
        assert_eq!(lines[3].len(), EXEC_RULE.len());
    }

    #[test]
    fn wide_pids_stay_aligned() {
        let mut table = ExecutionTable::new(Vec::new());
        for pid in [7, 2982, Pid::MAX] {
            table.transition(&Transition {
                time: 100,
                pid,
                from: ProcessState::Waiting,
                to: ProcessState::Ready,
            });
        }
        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        assert!(text.lines().all(|l| l.len() == EXEC_RULE.len()));
    }

    #[test]
    fn memory_rows() {
        let mem = PartitionTable::new(&[10, 5]).unwrap();
        let mut table = MemoryTable::new(Vec::new());
        table.memory(&mem.snapshot(0));
        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        assert!(text.lines().any(|l| l.contains("| -1, -1 |")));
    }

    #[test]
    fn empty_tables_are_still_closed() {
        let text = String::from_utf8(ExecutionTable::new(Vec::new()).finish().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 4);
    }
}
