use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tallyscan_core::ScanError;
use tallyscan_ocr::{OcrBackend, ReceiptPipeline};
use tokio::net::TcpListener;

mod config;
mod routes;
mod telemetry;

use config::ServerConfig;
use routes::{ApiError, AppState, ScanResponse};

const USAGE: &str = "usage: tallyscan-server [--scan <image>]";

enum Mode {
    Serve,
    ScanOnce(PathBuf),
}

fn parse_args() -> Result<Mode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(Mode::Serve),
        [flag, path] if flag == "--scan" => Ok(Mode::ScanOnce(PathBuf::from(path))),
        [flag] if flag == "--help" || flag == "-h" => {
            println!("{USAGE}");
            std::process::exit(0);
        }
        _ => bail!("{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mode = parse_args()?;
    telemetry::init("tallyscan-server")?;

    let config = ServerConfig::load()?;
    let pipeline = Arc::new(ReceiptPipeline::new(build_backend(&config), config.pipeline_config()));

    match mode {
        Mode::ScanOnce(path) => scan_once(&pipeline, &config, &path).await,
        Mode::Serve => serve(pipeline, config).await,
    }
}

#[cfg(feature = "tesseract")]
fn build_backend(config: &ServerConfig) -> Box<dyn OcrBackend> {
    tracing::info!(language = %config.recognizer.language, "Using Tesseract OCR backend");
    Box::new(tallyscan_ocr::TesseractRecognizer::new(
        config.tessdata.clone(),
        config.recognizer.clone(),
    ))
}

#[cfg(not(feature = "tesseract"))]
fn build_backend(_config: &ServerConfig) -> Box<dyn OcrBackend> {
    tracing::warn!("Built without the `tesseract` feature; every scan will fail");
    Box::new(tallyscan_ocr::UnavailableRecognizer)
}

async fn serve(pipeline: routes::SharedPipeline, config: ServerConfig) -> Result<()> {
    let state = AppState { pipeline, raw_text: config.raw_text };
    let app = routes::router(state, &config)?;

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Run the pipeline on one file and print the same JSON body the HTTP
/// endpoint would return.
async fn scan_once(
    pipeline: &routes::SharedPipeline,
    config: &ServerConfig,
    path: &std::path::Path,
) -> Result<()> {
    match pipeline.process_file(path).await.map_err(ScanError::from) {
        Ok(result) => {
            let body = ScanResponse::new(result, config.raw_text);
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(e) => {
            let body = ApiError::from(e.clone()).body();
            println!("{}", serde_json::to_string_pretty(&body)?);
            Err(e).with_context(|| format!("scanning {}", path.display()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl-C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
