use anyhow::{anyhow, Context};
use mpsim::*;
use mpsim::io::{init_logger, Config};
use log::info;
use tally::*;

/// Runs every scheduling strategy over one process table and reports
/// how each of them fared.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the process table
    #[arg(value_parser = clap::value_parser!(PathBuf))]
    input:      PathBuf,

    /// Round robin quantum, in ticks
    #[arg(short, long, default_value = "100")]
    quantum:    NonZeroUsize,

    /// Partition capacities, largest first
    #[arg(short, long, value_delimiter = ',')]
    partitions: Option<Vec<SimUnits>>,

    /// Print metrics as JSON instead of a summary
    #[arg(long)]
    json:       bool,

    /// Directory to draw one Gantt chart per strategy into
    #[arg(long, value_parser = clap::value_parser!(PathBuf))]
    gantt:      Option<PathBuf>,

    /// More output on stderr (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose:    u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    init_logger(cli.verbose)?;

    let table = pcb::load(cli.input.clone())
        .with_context(|| format!("loading {}", cli.input.display()))?;
    let mut config = Config::default();
    if let Some(sizes) = &cli.partitions {
        config = config.with_partitions(sizes);
    }
    let outcomes = compare(&table, &config, cli.quantum)?;

    for o in &outcomes {
        check(&table, &config.partitions, &o.transcript)
            .with_context(|| format!("{} produced a bad transcript", o.policy))?;
    }

    if cli.json {
        let all: Vec<&RunMetrics> = outcomes.iter().map(|o| &o.metrics).collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else {
        println!("{:<10} {:>9} {:>7} {:>11} {:>9} {:>9} {:>10}", "policy", "makespan", "util", "throughput", "avg tat", "avg wait", "avg resp");
        for o in &outcomes {
            let m = &o.metrics;
            println!(
                "{:<10} {:>9} {:>7.3} {:>11.4} {:>9.2} {:>9.2} {:>10.2}",
                m.policy, m.makespan, m.cpu_utilisation, m.throughput, m.avg_turnaround, m.avg_waiting, m.avg_response
            );
        }
    }

    if let Some(dir) = &cli.gantt {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        for o in &outcomes {
            let f = dir.join(format!("gantt_{}.png", o.policy.name().to_lowercase()));
            plot::gantt(&o.transcript.running_spans(), o.metrics.makespan, &o.metrics.policy, &f)
                .map_err(|e| anyhow!("drawing {}: {e}", f.display()))?;
            info!("wrote {}", f.display());
        }
    }

    Ok(())
}
