use clap::Parser;
use std::path::PathBuf;
use txn_etl::load::{reports, sqlite};
use txn_etl::utils::logger;

#[derive(Parser)]
#[command(name = "run-reports")]
#[command(about = "Run analysis reports against a loaded transaction database")]
struct Args {
    /// Path to the SQLite database produced by the ETL run
    #[arg(long, default_value = "./output/etl_results.sqlite")]
    database: PathBuf,

    /// SQL dump to restore the database from when it does not exist
    #[arg(long)]
    restore_from: Option<PathBuf>,

    /// Table holding the processed transactions
    #[arg(long, default_value = "accounts")]
    table: String,

    /// Directory to write report CSVs under (a reports/ subdirectory is created)
    #[arg(long, default_value = "./output")]
    output_path: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    if !args.database.exists() {
        match &args.restore_from {
            Some(dump_path) => {
                tracing::info!("💾 Restoring database from {}", dump_path.display());
                let dump_sql = std::fs::read_to_string(dump_path)?;
                sqlite::restore_from_dump(&args.database, &dump_sql)?;
            }
            None => {
                eprintln!("❌ Database not found: {}", args.database.display());
                eprintln!("💡 Run the ETL pipeline first, or pass --restore-from <dump.sql>");
                std::process::exit(1);
            }
        }
    }

    tracing::info!("📊 Running reports against {}", args.database.display());

    match reports::run_reports(&args.database, &args.table, &args.output_path) {
        Ok(written) => {
            println!("✅ Wrote {} report(s):", written.len());
            for path in written {
                println!("  📊 {}", path.display());
            }
        }
        Err(e) => {
            tracing::error!("❌ Report generation failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }

    Ok(())
}
