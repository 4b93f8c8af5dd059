use clap::Parser;
use txn_etl::load::reports;
use txn_etl::utils::{logger, validation::Validate};
use txn_etl::{CliConfig, EtlEngine, LocalStorage, TransactionPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting txn-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let run_reports = config.reports;
    let output_path_str = config.output_path.clone();
    let table_name = config.table_name.clone();
    let database_filename = config.database_filename.clone();

    let storage = LocalStorage::new(config.output_path.clone());
    let pipeline = TransactionPipeline::new(storage, config.clone()).clean_only(config.clean_only);

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ ETL process completed successfully!");
            tracing::info!("📁 Output saved to: {}", output_path);
            println!("✅ ETL process completed successfully!");
            println!("📁 Output saved to: {}", output_path);

            if run_reports {
                let db_path = std::path::Path::new(&output_path_str).join(&database_filename);
                let written =
                    reports::run_reports(&db_path, &table_name, std::path::Path::new(&output_path_str))?;
                println!("📊 Wrote {} report(s) under {}/reports", written.len(), output_path_str);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                txn_etl::utils::error::ErrorSeverity::Low => 0,
                txn_etl::utils::error::ErrorSeverity::Medium => 2,
                txn_etl::utils::error::ErrorSeverity::High => 1,
                txn_etl::utils::error::ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
