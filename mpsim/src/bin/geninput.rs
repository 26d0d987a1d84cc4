use anyhow::Context;
use mpsim::*;
use rand::{rngs::StdRng, SeedableRng};

/// Generates a random process table for `mpsim`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Where to write the table
    #[arg(value_parser = clap::value_parser!(PathBuf))]
    output: PathBuf,

    /// How many processes
    #[arg(value_parser = clap::value_parser!(u64).range(1..=pcb::MAX_GENERATED as u64))]
    count:  u64,

    /// Fixed seed, for reproducible tables
    #[arg(short, long)]
    seed:   Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    let count = cli.count as usize;
    let procs = match cli.seed {
        Some(seed)  => pcb::generate(&mut StdRng::seed_from_u64(seed), count),
        None        => pcb::generate(&mut rand::thread_rng(), count),
    };
    let fd = File::create(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    let mut out = BufWriter::new(fd);
    pcb::write_table(&mut out, &procs)?;
    out.flush()?;

    Ok(())
}
