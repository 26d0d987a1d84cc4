use mpsim::*;
use mpsim::io::Config;
use tally::*;

fn get_crate_root() -> Result<PathBuf, std::env::VarError> {
    Ok(PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?))
}

fn read_from_path(p: &str) -> Result<ProcessTable, Box<dyn std::error::Error>> {
    let mut file_path = get_crate_root()?;
    file_path.push(p);

    Ok(pcb::load(file_path)?)
}

fn table_of(procs: Vec<Process>) -> ProcessTable {
    pcb::init(procs).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn single_process_metrics() {
    let table = table_of(vec![Process::new(1, 10, 0, 5, 3, 2)]);
    let trc = simulate(&table, &Config::default()).unwrap();
    let m = measure(&trc, "FCFS");
    assert_eq!(m.makespan, 7);
    assert_eq!(m.busy, 5);
    assert!(close(m.cpu_utilisation, 5.0 / 7.0));
    assert!(close(m.throughput, 1.0 / 7.0));
    assert_eq!(
        m.processes,
        vec![ProcessMetrics {
            pid:        1,
            arrival:    0,
            first_run:  0,
            finish:     7,
            turnaround: 7,
            waiting:    0,
            response:   0,
        }]
    );
}

#[test]
fn waiting_is_time_in_ready() {
    let table = table_of(vec![
        Process::new(5, 5, 0, 3, 0, 0),
        Process::new(2, 5, 0, 3, 0, 0),
    ]);
    let trc = simulate(&table, &Config::default()).unwrap();
    let m = measure(&trc, "FCFS");
    let late = m.processes.iter().find(|p| p.pid == 5).unwrap();
    assert_eq!((late.waiting, late.response, late.turnaround), (3, 3, 6));
    assert!(close(m.avg_turnaround, 4.5));
    assert!(close(m.avg_waiting, 1.5));
    assert!(close(m.avg_response, 1.5));
    assert!(close(m.cpu_utilisation, 1.0));
}

#[test]
fn compare_all_strategies() {
    let table = read_from_path("tests/data/mixed.txt").unwrap();
    let config = Config::default();
    let outcomes = compare(&table, &config, NonZeroUsize::new(4).unwrap()).unwrap();
    let names: Vec<String> = outcomes.iter().map(|o| o.metrics.policy.clone()).collect();
    assert_eq!(names, vec!["FCFS", "EP", "RR(q=4)"]);
    for o in &outcomes {
        check(&table, &config.partitions, &o.transcript).unwrap();
        assert_eq!(o.metrics.processes.len(), table.len());
        // Same work whatever the order.
        assert_eq!(o.metrics.busy, table.values().map(|p| p.cpu_total).sum::<SimUnits>());
        assert!(o.metrics.cpu_utilisation <= 1.0);
    }
}

#[test]
fn large_quantum_without_io_is_fcfs() {
    let table = table_of(vec![
        Process::new(4, 20, 0, 6, 0, 0),
        Process::new(1, 30, 2, 3, 0, 0),
        Process::new(8, 35, 2, 5, 0, 0),
        Process::new(2, 3, 7, 2, 0, 0),
    ]);
    let outcomes = compare(&table, &Config::default(), NonZeroUsize::new(1000).unwrap()).unwrap();
    let fcfs = outcomes[0].transcript.running_spans();
    let rr = outcomes[2].transcript.running_spans();
    assert_eq!(fcfs, rr);
}

#[test]
fn metrics_serialize() {
    let table = table_of(vec![Process::new(3, 1, 2, 2, 0, 0)]);
    let trc = simulate(&table, &Config::default()).unwrap();
    let json = serde_json::to_value(measure(&trc, "EP")).unwrap();
    assert_eq!(json["policy"], "EP");
    assert_eq!(json["makespan"], 4);
    assert_eq!(json["processes"][0]["pid"], 3);
    assert_eq!(json["processes"][0]["arrival"], 2);
}

#[test]
fn stalls_surface_through_compare() {
    let table = table_of(vec![Process::new(1, 41, 0, 1, 0, 0)]);
    let res = compare(&table, &Config::default(), NonZeroUsize::new(2).unwrap());
    assert!(matches!(res, Err(SimError::Stalled { time: 0, .. })));
}

#[test]
fn tampered_transcripts_are_caught() {
    let table = table_of(vec![
        Process::new(1, 10, 0, 5, 3, 2),
        Process::new(2, 3, 1, 2, 0, 0),
    ]);
    let layout = Config::default().partitions;
    let good = simulate(&table, &Config::default()).unwrap();
    assert_eq!(check(&table, &layout, &good), Ok(()));

    let mut leak = good.clone();
    leak.snapshots.pop();
    assert_eq!(check(&table, &layout, &leak), Err(Violation::MemoryLeak));

    let mut twice = good.clone();
    twice.snapshots[0].occupants = vec![Some(1), None, None, Some(1), None, None];
    assert!(matches!(check(&table, &layout, &twice), Err(Violation::DoubleResidency { pid: 1, .. })));

    let mut cramped = good.clone();
    cramped.snapshots[0].occupants = vec![None, None, None, None, None, Some(1)];
    assert!(matches!(check(&table, &layout, &cramped), Err(Violation::Overflow { pid: 1, partition: 6, .. })));

    let mut cut = good.clone();
    cut.transitions.pop();
    assert!(matches!(check(&table, &layout, &cut), Err(Violation::Unfinished { .. })));

    let mut skipped = good;
    skipped.transitions.retain(|t| !(t.pid == 2 && t.to == ProcessState::New));
    assert!(matches!(check(&table, &layout, &skipped), Err(Violation::IllegalTransition { pid: 2, .. })));
}

#[test]
fn gantt_lanes_follow_first_dispatch() {
    let spans = [
        Span { pid: 7, start: 0, end: 2 },
        Span { pid: 3, start: 2, end: 3 },
        Span { pid: 7, start: 4, end: 6 },
    ];
    assert_eq!(plot::lanes(&spans), vec![7, 3]);
    assert!(plot::lanes(&[]).is_empty());
}
