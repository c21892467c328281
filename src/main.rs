use challenge_escrow::application::engine::{ChallengeEngine, Stores};
use challenge_escrow::application::lifecycle::ChallengeLifecycleService;
use challenge_escrow::config::EngineConfig;
use challenge_escrow::domain::ports::IdGeneratorRef;
use challenge_escrow::infrastructure::authorization::ParticipantPolicy;
use challenge_escrow::infrastructure::clock::ManualClock;
use challenge_escrow::infrastructure::ids::UuidV7Generator;
use challenge_escrow::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use challenge_escrow::infrastructure::rocksdb::RocksDBStore;
use challenge_escrow::interfaces::csv::command_reader::CommandReader;
use challenge_escrow::interfaces::csv::report_writer::ReportWriter;
use challenge_escrow::interfaces::csv::script_runner::ScriptRunner;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV script of wallet and challenge commands
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON file with fee settings (optional)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(&path).into_diagnostic()?;
            tracing::info!(path = %path.display(), "using RocksDB storage");
            Ok(Stores::shared(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Stores::shared(InMemoryStore::new()))
        }
        None => Ok(Stores::shared(InMemoryStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("challenge_escrow=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).into_diagnostic()?;

    let ids: IdGeneratorRef = Arc::new(UuidV7Generator);
    let clock = ManualClock::default();
    let lifecycle = ChallengeLifecycleService::new(ids.clone(), Arc::new(clock.clone()), config.fees);
    let engine = ChallengeEngine::new(stores(cli.db_path)?, lifecycle, Arc::new(ParticipantPolicy));
    let mut runner = ScriptRunner::new(engine, clock, ids);

    // Replay commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for row in reader.commands() {
        match row {
            Ok(row) => {
                if let Err(e) = runner.apply(row).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Output final balances
    let lines = runner.report().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_lines(lines).into_diagnostic()?;

    Ok(())
}
