use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kiosk_screenshotter::capture::{check_shot_scraper, CaptureSettings, ShotScraper};
use kiosk_screenshotter::cloudinary::CloudinaryClient;
use kiosk_screenshotter::config::Config;
use kiosk_screenshotter::cycle::{CaptureCycle, CycleSettings};
use kiosk_screenshotter::recorder::ScreenshotRecorder;
use kiosk_screenshotter::scheduler::HourlyScheduler;
use kiosk_screenshotter::supabase::SupabaseClient;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    // Load and validate configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        timezone = %config.timezone,
        urls_file = %config.urls_file.display(),
        output_dir = %config.output_dir.display(),
        "App started"
    );

    let cleanup_script = config
        .load_cleanup_script()
        .await
        .context("Failed to load cleanup script")?;

    match check_shot_scraper(&config.shot_scraper_path, config.capture_timeout).await {
        Ok(version) => info!(version = %version, "shot-scraper available"),
        Err(e) => warn!(
            path = %config.shot_scraper_path,
            "shot-scraper not usable, captures will fail until it is installed: {e:#}"
        ),
    }

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let media = Arc::new(CloudinaryClient::new(http.clone(), config.cloudinary.clone()));
    let metadata = Arc::new(SupabaseClient::new(http, config.supabase.clone()));
    let recorder = ScreenshotRecorder::new(media, metadata);

    let capturer = Arc::new(ShotScraper::new(CaptureSettings {
        executable: config.shot_scraper_path.clone(),
        wait_ms: config.capture_wait_ms,
        viewport_width: config.viewport_width,
        viewport_height: config.viewport_height,
        quality: config.jpeg_quality,
        cleanup_script,
        timeout: config.capture_timeout,
    }));

    let cycle = Arc::new(CaptureCycle::new(
        CycleSettings {
            urls_file: config.urls_file.clone(),
            output_dir: config.output_dir.clone(),
            timezone: config.timezone,
            public_id_prefix: config.public_id_prefix.clone(),
        },
        capturer,
        recorder,
    ));

    let scheduler = HourlyScheduler::new(config.timezone, config.misfire_grace, cycle);
    if config.run_on_startup {
        info!("Running initial capture on startup");
        scheduler.fire_now();
    }

    let shutdown = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down scheduler...");
    shutdown.cancel();
    // An in-flight job is abandoned rather than awaited.
    drop(scheduler_handle);

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kiosk_screenshotter=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
