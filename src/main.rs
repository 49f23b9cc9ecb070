use anyhow::{anyhow, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::Multipart;
use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

mod codec;
mod convert;
mod error;
mod filename;
mod options;
mod output_dir;

use convert::{ConversionRequest, UploadedFile};
use error::ConvertError;
use output_dir::OutputDir;

/// Batches of uploaded images tend to be large; axum's default body limit
/// is far too small for them.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about = "Batch image conversion server")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "4000")]
    port: u16,

    /// Initial output directory (default: converted/ next to the executable)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    output_dir: Arc<OutputDir>,
}

#[derive(Deserialize)]
struct SetOutputBody {
    #[serde(rename = "outputPath", default)]
    output_path: Option<String>,
}

async fn set_output(
    State(state): State<AppState>,
    Json(body): Json<SetOutputBody>,
) -> Result<Json<Value>, ConvertError> {
    let requested = body.output_path.as_deref().unwrap_or_default();
    let resolved = state.output_dir.set(requested)?;
    Ok(Json(json!({
        "success": true,
        "outputDir": resolved.display().to_string(),
    })))
}

async fn get_output_dir(State(state): State<AppState>) -> Result<Json<Value>, ConvertError> {
    let dir = state.output_dir.ensure()?;
    Ok(Json(json!({ "outputDir": dir.display().to_string() })))
}

async fn open_folder(State(state): State<AppState>) -> Result<Json<Value>, ConvertError> {
    state.output_dir.open_in_file_manager()?;
    Ok(Json(json!({ "success": true })))
}

async fn convert_api(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, ConvertError> {
    let request = read_multipart(multipart).await?;
    log::info!(
        "convert request: {} file(s) -> {}",
        request.files.len(),
        request.format
    );

    // Codec work is CPU-bound; keep it off the async workers. Files within
    // the batch still run sequentially, in submission order.
    let output_dir = state.output_dir.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        convert::convert_batch(request, &output_dir)
    })
    .await
    .map_err(|e| ConvertError::Internal(e.to_string()))??;

    Ok(Json(json!({
        "success": true,
        "count": outcome.results.len(),
        "outputDir": outcome.output_dir.display().to_string(),
        "results": outcome.results,
    })))
}

async fn read_multipart(mut multipart: Multipart) -> Result<ConversionRequest, ConvertError> {
    let mut request = ConversionRequest {
        format: String::new(),
        quality: None,
        compression: None,
        files: Vec::new(),
    };

    let bad_upload = |e: axum_extra::extract::multipart::MultipartError| {
        ConvertError::Upload(e.to_string())
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "images" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(bad_upload)?.to_vec();
                request.files.push(UploadedFile { name, bytes });
            }
            "format" => request.format = field.text().await.map_err(bad_upload)?,
            "quality" => request.quality = Some(field.text().await.map_err(bad_upload)?),
            "compression" => request.compression = Some(field.text().await.map_err(bad_upload)?),
            _ => {}
        }
    }

    Ok(request)
}

fn default_output_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("converted")))
        .unwrap_or_else(|| PathBuf::from("converted"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let output_dir = Arc::new(OutputDir::new(
        args.output.unwrap_or_else(default_output_dir),
    ));
    // Fail early on an unusable default rather than on the first batch.
    let initial = output_dir.ensure().map_err(|e| anyhow!("{e}"))?;

    let state = AppState { output_dir };
    let app = Router::new()
        .route("/api/set-output", post(set_output))
        .route("/api/output-dir", get(get_output_dir))
        .route("/api/convert", post(convert_api))
        .route("/api/open-folder", post(open_folder))
        .fallback_service(ServeDir::new("public"))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state);

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to {}: {}", addr, e))?;

    log::info!("🖼️  image converter listening at http://{addr}");
    log::info!("📂 output folder: {}", initial.display());

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Server error: {}", e))?;

    Ok(())
}
