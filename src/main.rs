use clap::Parser;
use phishguard::utils::error::ErrorSeverity;
use phishguard::utils::logger::{self, LogFormat};
use phishguard::utils::monitor::ResourceMonitor;
use phishguard::{app, AppState, CliArgs, GuardError, ModelRegistry};
use std::sync::Arc;

fn report_startup_failure(e: &GuardError) -> ! {
    tracing::error!(
        "❌ Startup failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Critical => 3,
        _ => 1,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let resolved = args.resolve_config();

    // 設定讀不到時仍要能把錯誤印出來
    let format = match &resolved {
        Ok(config) => LogFormat::from_name(&config.server.log_format),
        Err(_) if args.use_json_logs() => LogFormat::Json,
        Err(_) => LogFormat::Compact,
    };
    logger::init_logger(format, args.verbose);

    tracing::info!("Starting phishguard server");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match resolved {
        Ok(config) => config,
        Err(e) => report_startup_failure(&e),
    };

    let monitor = ResourceMonitor::new(config.monitoring_enabled());
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }
    monitor.log_snapshot("Startup");

    // 模型只在啟動時載入一次
    let registry = ModelRegistry::load(&config);
    monitor.log_snapshot("Models loaded");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = match AppState::build(config, registry) {
        Ok(state) => Arc::new(state),
        Err(e) => report_startup_failure(&e),
    };

    let health = state.health();
    tracing::info!(
        "🩺 phishing_model: {}, deepfake_detector: {}, schema: {}, strategy: {}",
        health.phishing_model,
        health.deepfake_detector,
        health.details.feature_schema,
        health.details.feature_strategy
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Listening on http://{}", listener.local_addr()?);
    println!("✅ PhishGuard server running at http://{}", addr);

    app::serve(listener, state).await?;
    Ok(())
}
