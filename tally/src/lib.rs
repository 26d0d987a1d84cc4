//! After-the-fact analysis of `mpsim` runs: per-process and run-level
//! metrics, side-by-side comparison of the scheduling strategies, a
//! consistency check over recorded transcripts, and Gantt charts.

use mpsim::*;
use mpsim::io::Config;
use log::debug;
use serde::Serialize;

/// How one process fared.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProcessMetrics {
    pub pid:            Pid,
    pub arrival:        SimUnits,
    pub first_run:      SimUnits,
    pub finish:         SimUnits,
    /// Finish minus arrival.
    pub turnaround:     SimUnits,
    /// Total time spent in `READY`.
    pub waiting:        SimUnits,
    /// First dispatch minus arrival.
    pub response:       SimUnits,
}

/// How a whole run fared.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RunMetrics {
    pub policy:             String,
    pub makespan:           SimUnits,
    /// Ticks in which some process was running.
    pub busy:               SimUnits,
    pub cpu_utilisation:    f64,
    /// Terminated processes per tick.
    pub throughput:         f64,
    pub avg_turnaround:     f64,
    pub avg_waiting:        f64,
    pub avg_response:       f64,
    pub processes:          Vec<ProcessMetrics>,
}

// Running totals while walking a transcript.
#[derive(Default)]
struct Acc {
    arrival:        Option<SimUnits>,
    first_run:      Option<SimUnits>,
    finish:         Option<SimUnits>,
    ready_since:    Option<SimUnits>,
    waiting:        SimUnits,
}

fn ratio(num: SimUnits, den: SimUnits) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn mean<I: Iterator<Item = SimUnits>>(vals: I, n: usize) -> f64 {
    ratio(vals.sum(), n)
}

/// Derives metrics from a transcript alone. Processes that never
/// terminated are left out.
pub fn measure(trc: &Transcript, policy: &str) -> RunMetrics {
    let mut accs: IndexMap<Pid, Acc> = IndexMap::new();
    for t in &trc.transitions {
        let acc = accs.entry(t.pid).or_default();
        match t.to {
            ProcessState::New           => { acc.arrival = Some(t.time); },
            ProcessState::Ready         => { acc.ready_since = Some(t.time); },
            ProcessState::Running       => {
                if let Some(since) = acc.ready_since.take() {
                    acc.waiting += t.time - since;
                }
                acc.first_run.get_or_insert(t.time);
            },
            ProcessState::Terminated    => { acc.finish = Some(t.time); },
            _                           => {},
        }
    }
    let processes: Vec<ProcessMetrics> = accs
        .into_iter()
        .filter_map(|(pid, acc)| {
            let (arrival, first_run, finish) = (acc.arrival?, acc.first_run?, acc.finish?);
            Some(ProcessMetrics {
                pid,
                arrival,
                first_run,
                finish,
                turnaround: finish - arrival,
                waiting:    acc.waiting,
                response:   first_run - arrival,
            })
        })
        .collect();
    let makespan = trc.makespan();
    let busy: SimUnits = trc.running_spans()
        .iter()
        .map(|s| s.end - s.start)
        .sum();
    let n = processes.len();

    RunMetrics {
        policy:             policy.to_string(),
        makespan,
        busy,
        cpu_utilisation:    ratio(busy, makespan),
        throughput:         ratio(n, makespan),
        avg_turnaround:     mean(processes.iter().map(|p| p.turnaround), n),
        avg_waiting:        mean(processes.iter().map(|p| p.waiting), n),
        avg_response:       mean(processes.iter().map(|p| p.response), n),
        processes,
    }
}

/// Runs `table` to completion under `config`, on a copy.
pub fn simulate(table: &ProcessTable, config: &Config) -> Result<Transcript, SimError> {
    let mut ctx = SimulationContext::new(table.clone(), config)?;
    let mut trc = Transcript::new();
    ctx.run(&mut trc)?;

    Ok(trc)
}

/// One strategy's run over a shared table.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub policy:     Policy,
    pub transcript: Transcript,
    pub metrics:    RunMetrics,
}

/// Runs FCFS, EP and RR over the same table, in parallel. Results come
/// back in that order. `base` supplies everything but the policy.
pub fn compare(table: &ProcessTable, base: &Config, quantum: NonZeroUsize) -> Result<Vec<Outcome>, SimError> {
    use rayon::prelude::*;

    Strategy::value_variants()
        .par_iter()
        .map(|s| {
            let policy = s.into_policy(quantum);
            let config = base.clone().with_policy(policy);
            let transcript = simulate(table, &config)?;
            let metrics = measure(&transcript, &policy.to_string());
            debug!("{} finished at t={}", policy, metrics.makespan);
            Ok(Outcome { policy, transcript, metrics })
        })
        .collect()
}

/// A transcript that no correct run could have produced.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Violation {
    #[error("t={time}: pid {dispatched} dispatched while pid {running} holds the CPU")]
    CpuOverlap {
        time:       SimUnits,
        running:    Pid,
        dispatched: Pid,
    },
    #[error("t={time}: pid {pid} went {from} -> {to}")]
    IllegalTransition {
        time:   SimUnits,
        pid:    Pid,
        from:   ProcessState,
        to:     ProcessState,
    },
    #[error("pid {pid} never terminated")]
    Unfinished {
        pid:    Pid,
    },
    #[error("pid {pid} ran for {ran} ticks instead of {needed}")]
    CpuMismatch {
        pid:    Pid,
        ran:    SimUnits,
        needed: SimUnits,
    },
    #[error("t={time}: pid {pid} sits in more than one partition")]
    DoubleResidency {
        time:   SimUnits,
        pid:    Pid,
    },
    #[error("t={time}: pid {pid} does not fit in partition {partition}")]
    Overflow {
        time:       SimUnits,
        pid:        Pid,
        partition:  usize,
    },
    #[error("memory is still in use after the last event")]
    MemoryLeak,
}

/// Replays `trc` against the table it came from and the partition
/// layout it ran on. Reports the first problem found.
pub fn check(table: &ProcessTable, layout: &[SimUnits], trc: &Transcript) -> Result<(), Violation> {
    let mut states: IndexMap<Pid, ProcessState> = table.keys()
        .map(|pid| (*pid, ProcessState::NotArrived))
        .collect();
    let mut ran: IndexMap<Pid, SimUnits> = IndexMap::new();
    let mut on_cpu: Option<(Pid, SimUnits)> = None;
    for t in &trc.transitions {
        let current = states.entry(t.pid).or_insert(ProcessState::NotArrived);
        if *current != t.from || !t.from.can_become(t.to) {
            return Err(Violation::IllegalTransition { time: t.time, pid: t.pid, from: *current, to: t.to });
        }
        *current = t.to;
        if t.to == ProcessState::Running {
            if let Some((running, _)) = on_cpu {
                return Err(Violation::CpuOverlap { time: t.time, running, dispatched: t.pid });
            }
            on_cpu = Some((t.pid, t.time));
        } else if t.from == ProcessState::Running {
            // `states` already vouches for the pid.
            if let Some((_, start)) = on_cpu.take() {
                *ran.entry(t.pid).or_default() += t.time - start;
            }
        }
    }
    for (pid, p) in table {
        if states.get(pid) != Some(&ProcessState::Terminated) {
            return Err(Violation::Unfinished { pid: *pid });
        }
        let used = ran.get(pid).copied().unwrap_or(0);
        if used != p.cpu_total {
            return Err(Violation::CpuMismatch { pid: *pid, ran: used, needed: p.cpu_total });
        }
    }
    for snap in &trc.snapshots {
        let mut seen = vec![];
        for (idx, occ) in snap.occupants.iter().enumerate() {
            let Some(pid) = occ else { continue };
            if seen.contains(pid) {
                return Err(Violation::DoubleResidency { time: snap.time, pid: *pid });
            }
            seen.push(*pid);
            let fits = match (table.get(pid), layout.get(idx)) {
                (Some(p), Some(&cap))   => p.size <= cap,
                _                       => false,
            };
            if !fits {
                return Err(Violation::Overflow { time: snap.time, pid: *pid, partition: idx + 1 });
            }
        }
    }
    if let Some(last) = trc.snapshots.last() {
        if last.occupants.iter().any(|o| o.is_some()) {
            return Err(Violation::MemoryLeak);
        }
    }

    Ok(())
}

pub mod plot {
    use plotters::prelude::*;
    use mpsim::{Pid, SimUnits, Span};
    use std::path::Path;

    /// One lane per process, in order of first dispatch.
    pub fn lanes(spans: &[Span]) -> Vec<Pid> {
        let mut res: Vec<Pid> = vec![];
        for s in spans {
            if !res.contains(&s.pid) {
                res.push(s.pid);
            }
        }

        res
    }

    /// Draws CPU occupation over time as a PNG. Idle stretches stay
    /// blank.
    pub fn gantt(spans: &[Span], makespan: SimUnits, title: &str, f: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let pids = lanes(spans);
        let backend = BitMapBackend::new(f, (1600, 120 + 40 * pids.len() as u32)).into_drawing_area();
        backend.fill(&WHITE)?;
        let backend = backend.margin(10u32, 10u32, 10u32, 10u32);

        let mut chart = ChartBuilder::on(&backend)
                            .caption(title, ("sans-serif", 20).into_font())
                            .x_label_area_size(30u32)
                            .y_label_area_size(60u32)
                            .build_cartesian_2d(0..makespan.max(1), 0..pids.len().max(1))?;

        let y_fmt = |y: &usize| pids.get(*y).map(|p| format!("pid {p}")).unwrap_or_default();
        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_desc("time")
            .x_labels(20)
            .y_labels(pids.len().max(1))
            .y_label_formatter(&y_fmt)
            .draw()?;

        chart.draw_series(create_series(spans, &pids))?;
        backend.present()?;

        Ok(())
    }

    fn create_series(spans: &[Span], pids: &[Pid]) -> Vec<Rectangle<(usize, usize)>> {
        let mut res: Vec<Rectangle<(usize, usize)>> = Vec::new();

        for s in spans {
            let Some(lane) = pids.iter().position(|p| *p == s.pid) else { continue };
            res.push(Rectangle::new([
                (s.start, lane + 1),
                (s.end, lane)],
                Palette99::pick(lane).filled(),
            ));
        }

        res
    }
}
