use crate::utils::*;
use crate::io::Config;
use crate::{Mode, PartitionTable, Policy, Recorder};

/// Everything a run needs, in one place: the clock, the process arena,
/// the partition table, the ready queue and the policy.
///
/// Nothing here is shared. The engine mutates it through `&mut self`,
/// one tick at a time.
pub struct SimulationContext {
    time:       SimUnits,
    procs:      ProcessTable,
    memory:     PartitionTable,
    // Pids in the order they became `Ready`.
    ready:      VecDeque<Pid>,
    policy:     Policy,
    max_ticks:  Option<SimUnits>,
    // First error returned by `step`. Once set, the run is over.
    halted:     Option<SimError>,
}

impl SimulationContext {
    pub fn new(procs: ProcessTable, config: &Config) -> Result<Self, SimError> {
        let memory = PartitionTable::new(&config.partitions)?;
        for (&key, p) in &procs {
            if key != p.pid {
                return Err(SimError::PidMismatch { key, pid: p.pid });
            }
            assert_eq!(p.state(), ProcessState::NotArrived, "pid {} has already been simulated", p.pid);
            if p.size > memory.largest() {
                warn!(
                    "pid {} needs {} units but the largest partition has {}; it will never run",
                    p.pid, p.size, memory.largest()
                );
            }
        }

        Ok(Self {
            time:       0,
            procs,
            memory,
            ready:      VecDeque::new(),
            policy:     config.policy,
            max_ticks:  config.max_ticks,
            halted:     None,
        })
    }

    pub fn time(&self) -> SimUnits { self.time }

    pub fn policy(&self) -> Policy { self.policy }

    pub fn processes(&self) -> &ProcessTable { &self.procs }

    pub fn memory(&self) -> &PartitionTable { &self.memory }

    pub fn ready_queue(&self) -> &VecDeque<Pid> { &self.ready }

    /// Hands the process arena back, e.g. for reporting.
    pub fn into_processes(self) -> ProcessTable {
        self.procs
    }

    /// The error that stopped the run, if any.
    pub fn halted(&self) -> Option<&SimError> {
        self.halted.as_ref()
    }

    pub fn is_done(&self) -> bool {
        !self.procs.values().any(|p| p.is_live())
    }

    /// Runs until every process has terminated. Returns the final time.
    ///
    /// Fails instead of spinning forever if the remaining processes can
    /// never be admitted, or if the configured tick limit is crossed.
    pub fn run<R: Recorder>(&mut self, rec: &mut R) -> Result<SimUnits, SimError> {
        info!(
            "simulating {} processes under {} over {} partitions",
            self.procs.len(), self.policy, self.memory.len()
        );
        while !self.is_done() {
            self.step(rec)?;
        }
        assert!(self.memory.all_free(), "memory still allocated after the last process");
        info!("all processes terminated at t={}", self.time);

        Ok(self.time)
    }

    /// One iteration of the driver loop: admission, then either one idle
    /// tick or one complete slice.
    ///
    /// After the first error the context is frozen: every later call
    /// returns that same error and changes nothing.
    pub fn step<R: Recorder>(&mut self, rec: &mut R) -> Result<(), SimError> {
        if let Some(e) = &self.halted {
            return Err(e.clone());
        }
        self.iterate(rec)
            .inspect_err(|e| self.halted = Some(e.clone()))
    }

    fn iterate<R: Recorder>(&mut self, rec: &mut R) -> Result<(), SimError> {
        self.admit(rec);
        self.check_stalled()?;
        let order = self.next_order();
        match order.pid {
            None        => self.tick(rec),
            Some(pid)   => self.execute(pid, order, rec),
        }
    }

    /// What the policy wants to do next, as seen from the current state.
    pub fn next_order(&self) -> ExecutionOrder {
        let candidates: Vec<&Process> = self.ready
            .iter()
            .map(|pid| &self.procs[pid])
            .collect();
        match self.policy.select_next(&candidates, Mode::Execution) {
            Some(sel)   => self.procs[&sel.pid].plan(sel.slice),
            None        => ExecutionOrder::idle(),
        }
    }

    fn execute<R: Recorder>(
        &mut self,
        pid:    Pid,
        order:  ExecutionOrder,
        rec:    &mut R,
    ) -> Result<(), SimError> {
        let Some(next) = order.next else {
            unreachable!("non-idle order without a follow-up state");
        };
        debug!("t={}: pid {} runs for {} tick(s), then {}", self.time, pid, order.slice, next);
        if self.policy.ages() {
            self.procs[&pid].age();
        }
        self.set_state(pid, ProcessState::Running, rec);
        for _ in 0..order.slice {
            if let Err(e) = self.advance() {
                // Out of time mid-slice: give the CPU back untouched.
                self.set_state(pid, ProcessState::Ready, rec);
                return Err(e);
            }
            self.procs[&pid].consume_tick();
            self.catch_up(rec);
        }
        self.set_state(pid, next, rec);
        if next == ProcessState::Terminated {
            self.memory.release(&mut self.procs[&pid]);
            rec.memory(&self.memory.snapshot(self.time));
            // The freed partition may fit someone right away.
            self.admit(rec);
        }

        Ok(())
    }

    /// One idle tick.
    fn tick<R: Recorder>(&mut self, rec: &mut R) -> Result<(), SimError> {
        self.advance()?;
        self.catch_up(rec);

        Ok(())
    }

    /// Moves the clock forward by one, unless that would cross the tick
    /// limit. Nothing else is touched, so failing here leaves every
    /// process as it was.
    fn advance(&mut self) -> Result<(), SimError> {
        if let Some(limit) = self.max_ticks {
            if self.time >= limit {
                return Err(SimError::TickLimit { limit });
            }
        }
        self.time += 1;

        Ok(())
    }

    /// Lets the world catch up with the clock: new arrivals get admitted,
    /// finished I/O goes back to `Ready`.
    fn catch_up<R: Recorder>(&mut self, rec: &mut R) {
        self.admit(rec);
        self.complete_io(rec);
    }

    /// Arrivals become `New`; then `New` processes are moved into memory
    /// for as long as the policy's favourite fits somewhere.
    fn admit<R: Recorder>(&mut self, rec: &mut R) {
        let arrived: Vec<Pid> = self.procs
            .values()
            .filter(|p| p.state() == ProcessState::NotArrived && p.arrival <= self.time)
            .map(|p| p.pid)
            .collect();
        for pid in arrived {
            self.set_state(pid, ProcessState::New, rec);
        }

        while self.memory.has_free_space() {
            let choice = {
                let candidates: Vec<&Process> = self.procs
                    .values()
                    .filter(|p| p.state() == ProcessState::New)
                    .collect();
                self.policy.select_next(&candidates, Mode::Admission)
            };
            let Some(sel) = choice else { break };
            // No busy retry: whoever is first in line waits for the
            // next pass.
            if !self.memory.reserve(&mut self.procs[&sel.pid]) {
                break;
            }
            self.set_state(sel.pid, ProcessState::Ready, rec);
            rec.memory(&self.memory.snapshot(self.time));
        }
    }

    fn complete_io<R: Recorder>(&mut self, rec: &mut R) {
        let waiting: Vec<Pid> = self.procs
            .values()
            .filter(|p| p.state() == ProcessState::Waiting)
            .map(|p| p.pid)
            .collect();
        for pid in waiting {
            if self.procs[&pid].wait_tick() {
                self.set_state(pid, ProcessState::Ready, rec);
            }
        }
    }

    /// Only `New` processes are left and nothing else can free memory or
    /// arrive: the admission outcome can never change again.
    fn check_stalled(&self) -> Result<(), SimError> {
        let mut stuck = vec![];
        for p in self.procs.values() {
            match p.state() {
                ProcessState::New           => stuck.push(p.pid),
                ProcessState::Terminated    => {},
                _                           => return Ok(()),
            }
        }
        if stuck.is_empty() {
            Ok(())
        } else {
            Err(SimError::Stalled { time: self.time, pids: stuck })
        }
    }

    /// The only place where states change. Keeps the ready queue in sync
    /// and reports the transition.
    fn set_state<R: Recorder>(&mut self, pid: Pid, to: ProcessState, rec: &mut R) {
        let t = self.procs[&pid].transition(to, self.time);
        match to {
            ProcessState::Ready     => self.ready.push_back(pid),
            ProcessState::Running   => {
                // Round robin always takes the head, the others may
                // pick from anywhere.
                if self.ready.front() == Some(&pid) {
                    self.ready.pop_front();
                } else if let Some(pos) = self.ready.iter().position(|&p| p == pid) {
                    self.ready.remove(pos);
                }
            },
            _   => {}
        }
        debug_assert!(
            self.procs.values().filter(|p| p.state() == ProcessState::Running).count() <= 1,
            "more than one process running"
        );
        rec.transition(&t);
    }
}
