use clap::Parser;
use off_etl::core::Pipeline;
use off_etl::utils::error::ErrorSeverity;
use off_etl::utils::{logger, validation::Validate};
use off_etl::{
    CliConfig, Command, EtlEngine, EtlError, LogFormat, RemoteCopyPipeline, Result, RunSummary,
    TextImportPipeline, TomlConfig,
};

async fn run_pipeline<P: Pipeline>(pipeline: P, monitor_enabled: bool) -> Result<RunSummary> {
    let mut engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);
    engine.run().await
}

async fn run(config: &CliConfig) -> Result<RunSummary> {
    let file = match &config.config {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            Some(TomlConfig::from_file(path)?)
        }
        None => None,
    };

    match &config.command {
        Command::ImportTsv(args) => {
            let resolved = args.resolve(file.as_ref())?;
            resolved.validate()?;
            tracing::debug!("Text import config: {:?}", resolved);
            run_pipeline(TextImportPipeline::new(resolved), config.monitor).await
        }
        Command::CopyRemote(args) => {
            let resolved = args.resolve(file.as_ref())?;
            resolved.validate()?;
            tracing::debug!("Remote copy config: {:?}", resolved);
            run_pipeline(RemoteCopyPipeline::new(resolved), config.monitor).await
        }
    }
}

fn exit_code(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 傳輸錯誤，可重新執行
        ErrorSeverity::High => 1,     // 設定或前置條件錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    match config.log_format {
        LogFormat::Compact => logger::init_cli_logger(config.verbose),
        LogFormat::Json => logger::init_json_logger(config.verbose),
    }

    tracing::info!("Starting off-etl");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }
    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(&config).await {
        Ok(summary) => {
            tracing::info!(
                "✅ {} completed: {} records in {} ms",
                summary.pipeline,
                summary.total_written(),
                summary.elapsed_ms
            );
            println!("✅ ETL process completed successfully!");
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ {} failed (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let code = exit_code(&e);
            if code > 0 {
                std::process::exit(code);
            }
        }
    }
}
