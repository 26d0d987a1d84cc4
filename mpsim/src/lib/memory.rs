use crate::utils::*;

/// The fixed set of memory partitions.
///
/// Capacities must be supplied sorted from largest to smallest. The
/// allocator is *not* a general best-fit search: it walks the table
/// backwards and takes the first free partition that is big enough,
/// which is the tightest fit only because of that ordering.
#[derive(Clone, Debug)]
pub struct PartitionTable {
    slots: Vec<Partition>,
}

/// The state of memory right after an admission or a reclamation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub time:           SimUnits,
    /// Sum of the sizes of all resident processes.
    pub allocated:      SimUnits,
    /// One entry per partition, in table order.
    pub occupants:      Vec<Option<Pid>>,
    /// Total capacity minus `allocated`. Includes the unused
    /// tails of occupied partitions.
    pub total_free:     SimUnits,
    /// Capacity of the partitions nobody occupies.
    pub usable_free:    SimUnits,
}

impl Partition {
    fn new(number: usize, capacity: SimUnits) -> Self {
        Self { number, capacity, occupant: None, used: 0 }
    }

    pub fn occupant(&self) -> Option<Pid> { self.occupant }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

impl PartitionTable {
    /// This function is the gatekeeper for memory layouts: no partitions,
    /// zero-sized partitions and unsorted capacities are all refused.
    pub fn new(sizes: &[SimUnits]) -> Result<Self, SimError> {
        if sizes.is_empty() {
            return Err(SimError::NoPartitions);
        }
        for (idx, &capacity) in sizes.iter().enumerate() {
            if capacity == 0 {
                return Err(SimError::EmptyPartition { number: idx + 1 });
            }
        }
        if let Some((&prev, &next)) = sizes.iter()
            .tuple_windows()
            .find(|(a, b)| a < b) {
            return Err(SimError::UnsortedPartitions { prev, next });
        }

        Ok(Self {
            slots: sizes.iter()
                .enumerate()
                .map(|(idx, &capacity)| Partition::new(idx + 1, capacity))
                .collect(),
        })
    }

    /// Tries to find room for `proc`. On success the partition and the
    /// process point at each other and `true` is returned. On failure
    /// nothing changes: the caller is expected to try again later.
    pub fn reserve(&mut self, proc: &mut Process) -> bool {
        let size = proc.size;
        // Smallest partitions sit at the end.
        match self.slots
            .iter()
            .rposition(|p| p.is_free() && p.capacity >= size) {
            Some(idx) => {
                let slot = &mut self.slots[idx];
                slot.occupant = Some(proc.pid);
                slot.used = size;
                proc.bind(idx);
                debug!("pid {} -> partition {} ({} / {})", proc.pid, slot.number, size, slot.capacity);
                true
            },
            None    => false,
        }
    }

    /// Gives back whatever `proc` holds. No-op for processes without
    /// memory.
    pub fn release(&mut self, proc: &mut Process) {
        if let Some(idx) = proc.unbind() {
            let slot = &mut self.slots[idx];
            assert_eq!(slot.occupant, Some(proc.pid), "partition {} is not held by pid {}", slot.number, proc.pid);
            slot.occupant = None;
            slot.used = 0;
        }
    }

    pub fn has_free_space(&self) -> bool {
        self.slots.iter().any(|p| p.is_free())
    }

    pub fn all_free(&self) -> bool {
        self.slots.iter().all(|p| p.is_free())
    }

    /// Capacity of the biggest partition. Anything larger can never run.
    pub fn largest(&self) -> SimUnits {
        self.slots.iter().map(|p| p.capacity).max().unwrap_or(0)
    }

    pub fn capacity(&self) -> SimUnits {
        self.slots.iter().map(|p| p.capacity).sum()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Partition> {
        self.slots.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.slots.iter()
    }

    pub fn snapshot(&self, time: SimUnits) -> MemorySnapshot {
        let allocated: SimUnits = self.slots.iter().map(|p| p.used).sum();
        MemorySnapshot {
            time,
            allocated,
            occupants:      self.slots.iter().map(|p| p.occupant).collect(),
            total_free:     self.capacity() - allocated,
            usable_free:    self.slots.iter()
                                .filter(|p| p.is_free())
                                .map(|p| p.capacity)
                                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc_of(pid: Pid, size: SimUnits) -> Process {
        Process::new(pid, size, 0, 1, 0, 0)
    }

    #[test]
    fn tightest_fit_from_the_small_end() {
        let mut mem = PartitionTable::new(&PARTITION_SIZES).unwrap();
        let mut a = proc_of(1, 9);
        let mut b = proc_of(2, 2);
        let mut c = proc_of(3, 9);
        assert!(mem.reserve(&mut a));
        assert!(mem.reserve(&mut b));
        assert!(mem.reserve(&mut c));
        // 10 for the first 9, the 2 for the 2, then 15 since 10 is taken.
        assert_eq!(a.partition(), Some(3));
        assert_eq!(b.partition(), Some(5));
        assert_eq!(c.partition(), Some(2));
        assert_eq!(mem.get(3).unwrap().occupant(), Some(1));
    }

    #[test]
    fn failed_reservation_changes_nothing() {
        let mut mem = PartitionTable::new(&[10, 5]).unwrap();
        let mut big = proc_of(7, 11);
        assert!(!mem.reserve(&mut big));
        assert_eq!(big.partition(), None);
        assert!(mem.all_free());
    }

    #[test]
    fn release_is_idempotent() {
        let mut mem = PartitionTable::new(&[10, 5]).unwrap();
        let mut p = proc_of(1, 4);
        assert!(mem.reserve(&mut p));
        assert!(!mem.all_free());
        mem.release(&mut p);
        mem.release(&mut p);
        assert!(mem.all_free());
        assert_eq!(p.partition(), None);
    }

    #[test]
    fn snapshot_accounting() {
        let mut mem = PartitionTable::new(&PARTITION_SIZES).unwrap();
        let mut p = proc_of(4, 12);
        assert!(mem.reserve(&mut p));
        let snap = mem.snapshot(3);
        assert_eq!(snap.time, 3);
        assert_eq!(snap.allocated, 12);
        assert_eq!(snap.occupants, vec![None, None, Some(4), None, None, None]);
        assert_eq!(snap.total_free, 100 - 12);
        assert_eq!(snap.usable_free, 100 - 15);
    }

    #[test]
    fn bad_layouts() {
        assert_eq!(PartitionTable::new(&[]).unwrap_err(), SimError::NoPartitions);
        assert_eq!(
            PartitionTable::new(&[10, 0]).unwrap_err(),
            SimError::EmptyPartition { number: 2 }
        );
        assert_eq!(
            PartitionTable::new(&[10, 20, 5]).unwrap_err(),
            SimError::UnsortedPartitions { prev: 10, next: 20 }
        );
        assert!(PartitionTable::new(&[10, 10, 5]).is_ok());
    }
}
