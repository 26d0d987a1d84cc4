use crate::utils::*;
use rand::{seq::index::sample, Rng};

/// Number of mandatory columns in a process table line:
/// pid, memory size, arrival time, total CPU time, I/O frequency,
/// I/O duration. A seventh, optional column holds the initial priority.
pub const PCB_FIELDS_NUM: usize = 6;

/// Initializes a [`ProcessTable`] with a given set of processes.
/// A successfully returned table is guaranteed to be compliant with
/// all of the engine's assumptions. These are:
/// - pids are unique
/// - every process needs some memory
/// - every process needs some CPU time
/// - processes that do I/O wait for at least one tick
/// - every process is yet to arrive, with zeroed counters
///
/// This function is the gatekeeper to the rest of the library.
pub fn init(in_elts: Vec<Process>) -> Result<ProcessTable, ParseError> {
    if in_elts.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut res = ProcessTable::default();
    for (idx, p) in in_elts.into_iter().enumerate() {
        let line = idx + 1;
        let complaint = if p.size == 0 {
            Some("memory size must be positive")
        } else if p.cpu_total == 0 {
            Some("total CPU time must be positive")
        } else if p.io_freq != 0 && p.io_dur == 0 {
            Some("I/O duration must be positive when I/O frequency is")
        } else if p.state() != ProcessState::NotArrived || p.cpu_used() != 0 || p.partition().is_some() {
            Some("process has already been simulated")
        } else {
            None
        };
        if let Some(reason) = complaint {
            return Err(ParseError::Malformed { line, reason: format!("pid {}: {reason}", p.pid) });
        }
        let pid = p.pid;
        if res.insert(pid, p).is_some() {
            return Err(ParseError::DuplicatePid { line, pid });
        }
    }

    Ok(res)
}

/// Reads the text format, one process per line:
///
/// ```text
/// 15, 10, 0, 25, 10, 1
/// 12, 1, 0, 25, 10, 1
/// ```
///
/// Commas, spaces and tabs all separate fields. Blank lines and lines
/// starting with `#` are skipped.
pub struct PcbParser {
    pub path: PathBuf,
}

impl PcbParser {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }

    /// Does the actual work of [`TableGen::read_processes`], on any
    /// buffered source.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Process>, ParseError> {
        let mut res = vec![];
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let fields = text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .map(|f| {
                    f.parse::<SimUnits>().map_err(|_| ParseError::Malformed {
                        line:   line_no,
                        reason: format!("`{f}` is not a non-negative integer"),
                    })
                })
                .collect::<Result<Vec<SimUnits>, ParseError>>()?;
            res.push(self.gen_single(&fields, line_no)?);
        }

        Ok(res)
    }
}

impl TableGen<&[SimUnits]> for PcbParser {
    fn read_processes(&self) -> Result<Vec<Process>, ParseError> {
        let fd = File::open(&self.path)?;
        self.parse(BufReader::new(fd))
    }

    fn gen_single(&self, d: &[SimUnits], line: usize) -> Result<Process, ParseError> {
        if d.len() != PCB_FIELDS_NUM && d.len() != PCB_FIELDS_NUM + 1 {
            return Err(ParseError::Malformed {
                line,
                reason: format!("expected {} or {} fields, found {}", PCB_FIELDS_NUM, PCB_FIELDS_NUM + 1, d.len()),
            });
        }
        let pid = Pid::try_from(d[0]).map_err(|_| ParseError::Malformed {
            line,
            reason: format!("pid {} is too large", d[0]),
        })?;
        let res = Process::new(pid, d[1], d[2], d[3], d[4], d[5]);

        Ok(match d.get(6) {
            Some(&prio) => res.with_priority(prio),
            None        => res,
        })
    }
}

/// Reads and validates a process table in one go.
pub fn load(path: PathBuf) -> Result<ProcessTable, ParseError> {
    let parser = PcbParser::new(path);
    init(parser.read_processes()?)
}

/// Largest table [`generate`] can make while keeping pids unique.
pub const MAX_GENERATED: usize = (Pid::MAX / 100) as usize;

/// Makes up `count` processes with unique pids drawn from
/// `0..=100 * count`. Sizes never exceed the largest default partition.
///
/// # Panics
///
/// If `count` exceeds [`MAX_GENERATED`].
pub fn generate<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Process> {
    assert!(count <= MAX_GENERATED, "cannot draw {count} unique pids");
    if count == 0 {
        return vec![];
    }
    // Fits: 100 * MAX_GENERATED <= Pid::MAX.
    sample(rng, 100 * count + 1, count)
        .into_vec()
        .into_iter()
        .map(|pid| {
            Process::new(
                pid as Pid,
                rng.gen_range(1..=PARTITION_SIZES[0]),
                rng.gen_range(0..=100),
                rng.gen_range(1..=40),
                rng.gen_range(1..=20),
                rng.gen_range(1..=20),
            )
        })
        .collect()
}

/// Writes processes back in the text format understood by [`PcbParser`].
/// Default priorities are left out.
pub fn write_table<W: Write>(out: &mut W, procs: &[Process]) -> std::io::Result<()> {
    for p in procs {
        write!(out, "{}, {}, {}, {}, {}, {}", p.pid, p.size, p.arrival, p.cpu_total, p.io_freq, p.io_dur)?;
        if p.priority() != 0 {
            write!(out, ", {}", p.priority())?;
        }
        writeln!(out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn parse(text: &str) -> Result<Vec<Process>, ParseError> {
        PcbParser::new(PathBuf::new()).parse(text.as_bytes())
    }

    #[test]
    fn separators_and_comments() {
        let procs = parse("# pid size arr cpu freq dur\n15, 10, 0, 25, 10, 1\n\n12 1 0 25 10 1 3\n").unwrap();
        assert_eq!(procs.len(), 2);
        assert_eq!(procs[0], Process::new(15, 10, 0, 25, 10, 1));
        assert_eq!(procs[1].priority(), 3);
    }

    #[test]
    fn malformed_lines_are_reported_with_their_number() {
        match parse("1, 2, 3, 4, 5, 6\n2, 2, x, 4, 5, 6\n") {
            Err(ParseError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
        match parse("1, 2, 3\n") {
            Err(ParseError::Malformed { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse("1, 2, -3, 4, 5, 6\n").is_err());
    }

    #[test]
    fn gatekeeping() {
        let dup = vec![Process::new(1, 1, 0, 1, 0, 0), Process::new(1, 2, 0, 1, 0, 0)];
        assert!(matches!(init(dup), Err(ParseError::DuplicatePid { line: 2, pid: 1 })));
        assert!(matches!(init(vec![]), Err(ParseError::Empty)));
        let no_cpu = vec![Process::new(1, 1, 0, 0, 0, 0)];
        assert!(matches!(init(no_cpu), Err(ParseError::Malformed { line: 1, .. })));
        let no_io_dur = vec![Process::new(1, 1, 0, 5, 2, 0)];
        assert!(init(no_io_dur).is_err());
        let table = init(vec![Process::new(3, 1, 0, 1, 0, 0), Process::new(2, 1, 0, 1, 0, 0)]).unwrap();
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    #[should_panic]
    fn too_many_to_generate() {
        generate(&mut StdRng::seed_from_u64(1), MAX_GENERATED + 1);
    }

    #[test]
    fn pids_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let procs = generate(&mut rng, 40);
        assert!(procs.iter().all(|p| (p.pid as usize) <= 100 * 40));
        assert!(generate(&mut rng, 0).is_empty());
    }

    #[test]
    fn generated_tables_read_back() {
        let mut rng = StdRng::seed_from_u64(7);
        let procs = generate(&mut rng, 25);
        assert_eq!(procs.len(), 25);
        assert!(procs.iter().map(|p| p.pid).all_unique());
        let mut buf = vec![];
        write_table(&mut buf, &procs).unwrap();
        let back = parse(std::str::from_utf8(&buf).unwrap()).unwrap();
        assert_eq!(back, procs);
        assert!(init(back).is_ok());
    }
}
