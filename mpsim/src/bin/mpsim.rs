use anyhow::Context;
use mpsim::*;
use mpsim::io::{init_logger, Config, ExecutionTable, MemoryTable};

/// Simulates a single-CPU multiprogramming system with fixed memory
/// partitions. Writes `execution.txt` and `memory_status.txt`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the process table
    #[arg(value_parser = clap::value_parser!(PathBuf))]
    input:      PathBuf,

    /// Scheduling strategy
    #[arg(value_enum, ignore_case = true)]
    strategy:   Strategy,

    /// Round robin quantum, in ticks
    #[arg(short, long, default_value = "100")]
    quantum:    NonZeroUsize,

    /// Partition capacities, largest first
    #[arg(short, long, value_delimiter = ',')]
    partitions: Option<Vec<SimUnits>>,

    /// Give up once the clock passes this value
    #[arg(long)]
    max_ticks:  Option<SimUnits>,

    /// Where to put the output tables
    #[arg(short, long, default_value = ".", value_parser = clap::value_parser!(PathBuf))]
    out_dir:    PathBuf,

    /// More output on stderr (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose:    u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    init_logger(cli.verbose)?;

    let procs = pcb::load(cli.input.clone())
        .with_context(|| format!("loading {}", cli.input.display()))?;
    let mut config = Config::default().with_policy(cli.strategy.into_policy(cli.quantum));
    if let Some(sizes) = &cli.partitions {
        config = config.with_partitions(sizes);
    }
    if let Some(limit) = cli.max_ticks {
        config = config.with_max_ticks(limit);
    }

    let exec_path = cli.out_dir.join("execution.txt");
    let mem_path = cli.out_dir.join("memory_status.txt");
    let exec_file = File::create(&exec_path)
        .with_context(|| format!("creating {}", exec_path.display()))?;
    let mem_file = File::create(&mem_path)
        .with_context(|| format!("creating {}", mem_path.display()))?;
    let mut tables = (
        ExecutionTable::new(BufWriter::new(exec_file)),
        MemoryTable::new(BufWriter::new(mem_file)),
    );

    let mut ctx = SimulationContext::new(procs, &config)?;
    let outcome = ctx.run(&mut tables);
    // Whatever happened, the tables should reflect it.
    let (exec, mem) = tables;
    exec.finish().with_context(|| format!("writing {}", exec_path.display()))?;
    mem.finish().with_context(|| format!("writing {}", mem_path.display()))?;
    let end = outcome?;

    println!(
        "{}: {} processes done at t={}",
        config.policy, ctx.processes().len(), end
    );

    Ok(())
}
