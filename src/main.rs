use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use talentradar::{pipeline, StackPolicy};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Cleans a raw job-postings CSV into the dashboard-ready Parquet artifact.
#[derive(Parser, Debug)]
#[command(name = "talentradar", version)]
struct Args {
    /// Raw postings CSV to process
    input: PathBuf,

    /// Where to write the cleaned artifact
    #[arg(long, default_value = "talent_radar.parquet")]
    output: PathBuf,

    /// Rows per processing chunk
    #[arg(long, default_value_t = 50_000)]
    chunk_size: usize,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let policy = StackPolicy::builtin();
    info!(policy = policy.version(), "startup");

    let summary = pipeline::run(&args.input, &args.output, policy, args.chunk_size)?;

    info!(
        total = summary.total_rows,
        retained = summary.retained,
        dropped_sector = summary.dropped_sector,
        dropped_title = summary.dropped_title,
        unreadable = summary.rows_unreadable,
        "done"
    );
    Ok(())
}
