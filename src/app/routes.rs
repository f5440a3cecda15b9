use crate::app::media::MediaSource;
use crate::app::state::SharedState;
use crate::utils::error::{GuardError, Result};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

pub fn router(state: SharedState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/detect-deepfake", post(detect_deepfake))
        .route("/detect-deepfake-url", post(detect_deepfake_url))
        .route("/scan-page-media", post(scan_page_media))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: SharedState) -> std::io::Result<()> {
    let app = router(state);
    axum::serve(listener, app).await
}

async fn index() -> &'static str {
    "Server is running"
}

async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!(state.health()))
}

/// 不用 `Json` 解析器：壞掉的 body 也要回 `{success:false}`
fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes, missing: &str) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected request body: {}", e);
        GuardError::input(missing)
    })
}

#[derive(Debug, Deserialize)]
struct UrlRequest {
    #[serde(default)]
    url: Option<String>,
}

fn required_url(request: UrlRequest) -> Result<String> {
    match request.url {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(GuardError::input("No URL provided")),
    }
}

async fn predict(State(state): State<SharedState>, body: Bytes) -> Result<Json<Value>> {
    let url = required_url(parse_body(&body, "No URL provided")?)?;
    let started = Instant::now();

    let record = state.assembler.assemble(&url).await?;
    let verdict = state.scorer.score(&url, &record).await?;

    info!(
        "🔍 {} -> {} ({:.2}, source: {:?}, {} ms)",
        url,
        verdict.label,
        verdict.confidence,
        verdict.source,
        started.elapsed().as_millis()
    );

    Ok(Json(json!({
        "success": true,
        "data": verdict.label,
        "is_phishing": verdict.is_phishing,
        "confidence": verdict.confidence,
        "source": verdict.source,
        "schema": verdict.schema,
    })))
}

async fn detect_deepfake(
    State(state): State<SharedState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>> {
    let mut multipart = multipart.map_err(|_| GuardError::input("No file provided"))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GuardError::input(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GuardError::input(format!("Invalid multipart payload: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| GuardError::input("No file provided"))?;
    let analysis = state.media.analyze_upload(&filename, bytes.to_vec()).await?;

    Ok(Json(json!({
        "success": true,
        "filename": filename,
        "file_type": analysis.file_type,
        "result": analysis.result,
    })))
}

async fn detect_deepfake_url(State(state): State<SharedState>, body: Bytes) -> Result<Json<Value>> {
    let url = required_url(parse_body(&body, "No URL provided")?)?;
    let analysis = state.media.analyze_remote(&url).await?;

    let mut result = json!(analysis.result);
    result["media_url"] = json!(url);
    Ok(Json(json!({
        "success": true,
        "file_type": analysis.file_type,
        "result": result,
    })))
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    #[serde(default)]
    page_url: Option<String>,
    #[serde(default)]
    media_sources: Vec<MediaSource>,
}

async fn scan_page_media(State(state): State<SharedState>, body: Bytes) -> Result<Json<Value>> {
    let request: ScanRequest = parse_body(&body, "Invalid scan request")?;
    let page_url = match request.page_url {
        Some(url) if !url.trim().is_empty() => url,
        _ => return Err(GuardError::input("No page URL provided")),
    };

    let results = state
        .media
        .scan_page(&page_url, &request.media_sources)
        .await?;
    info!("🖼️ Scanned {} media items on {}", results.len(), page_url);

    Ok(Json(json!({
        "success": true,
        "results": results,
    })))
}
