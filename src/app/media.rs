//! Media intake for deepfake checks: per-request temp storage, audio-track
//! extraction for video containers, remote downloads.

use crate::adapters::ffmpeg::FfmpegExtractor;
use crate::adapters::fetcher::MediaDownloader;
use crate::core::audio::normalize_file;
use crate::core::deepfake::DeepfakeScorer;
use crate::domain::model::DetectionResult;
use crate::utils::error::{GuardError, Result};
use crate::utils::validation::{
    validate_request_url, validate_upload_filename, SUPPORTED_MEDIA_EXTENSIONS, VIDEO_EXTENSIONS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSource {
    #[serde(rename = "type", default)]
    pub media_type: String,
    #[serde(default)]
    pub src: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanItem {
    pub media_url: String,
    pub media_type: String,
    pub prediction: String,
    pub confidence: f64,
    pub is_fake: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Analysis of one clip, plus the extension it was handled as.
#[derive(Debug, Clone)]
pub struct MediaAnalysis {
    pub file_type: String,
    pub result: DetectionResult,
}

pub struct MediaIntake {
    deepfake: Arc<DeepfakeScorer>,
    ffmpeg: FfmpegExtractor,
    downloader: MediaDownloader,
    temp_root: Option<PathBuf>,
    max_per_scan: usize,
}

impl MediaIntake {
    pub fn new(
        deepfake: Arc<DeepfakeScorer>,
        ffmpeg: FfmpegExtractor,
        downloader: MediaDownloader,
        temp_root: Option<PathBuf>,
        max_per_scan: usize,
    ) -> Self {
        Self {
            deepfake,
            ffmpeg,
            downloader,
            temp_root,
            max_per_scan,
        }
    }

    fn request_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("phishguard-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Multipart upload path. The filename decides the container type.
    pub async fn analyze_upload(&self, filename: &str, bytes: Vec<u8>) -> Result<MediaAnalysis> {
        let extension = validate_upload_filename(filename)?;
        if bytes.is_empty() {
            return Err(GuardError::input("Uploaded file is empty"));
        }
        info!("🎙️ Deepfake check for upload {} ({} bytes)", filename, bytes.len());
        self.analyze_bytes(bytes, extension).await
    }

    /// Downloads `url` and analyzes it; type from the URL extension or `Content-Type`.
    pub async fn analyze_remote(&self, url: &str) -> Result<MediaAnalysis> {
        let url = validate_request_url(url)?;
        let media = self.downloader.download(url.as_str()).await?;

        let extension = extension_from_url(&url)
            .or_else(|| media.content_type.as_deref().and_then(extension_from_content_type))
            .ok_or_else(|| GuardError::input("File type not supported"))?;
        info!("🌐 Deepfake check for {} (as {})", url, extension);
        self.analyze_bytes(media.bytes, extension.to_string()).await
    }

    /// 單一媒體失敗只影響該筆結果
    pub async fn scan_page(&self, page_url: &str, sources: &[MediaSource]) -> Result<Vec<ScanItem>> {
        let base = validate_request_url(page_url)?;

        if sources.len() > self.max_per_scan {
            debug!(
                "Page lists {} media sources, analyzing the first {}",
                sources.len(),
                self.max_per_scan
            );
        }

        let mut items = Vec::new();
        for source in sources.iter().take(self.max_per_scan) {
            let media_url = match base.join(source.src.trim()) {
                Ok(resolved) => resolved.to_string(),
                Err(_) => source.src.clone(),
            };

            let result = if source.src.trim().is_empty() {
                DetectionResult::error("Media source has no URL")
            } else {
                match self.analyze_remote(&media_url).await {
                    Ok(analysis) => analysis.result,
                    Err(e) => {
                        warn!("⚠️ Media {} could not be analyzed: {}", media_url, e);
                        DetectionResult::error(e.user_friendly_message())
                    }
                }
            };

            items.push(ScanItem {
                media_url,
                media_type: source.media_type.clone(),
                prediction: result.prediction,
                confidence: result.confidence,
                is_fake: result.is_fake,
                error: result.error,
            });
        }
        Ok(items)
    }

    async fn analyze_bytes(&self, bytes: Vec<u8>, extension: String) -> Result<MediaAnalysis> {
        if !self.deepfake.is_available() {
            let reason = self.deepfake.unavailable_reason().unwrap_or("detector not loaded");
            return Ok(MediaAnalysis {
                file_type: extension,
                result: DetectionResult::error(reason),
            });
        }

        let dir = self.request_dir()?;
        let input = dir.path().join(format!("input.{}", extension));
        tokio::fs::write(&input, &bytes).await?;
        drop(bytes);

        let deepfake = Arc::clone(&self.deepfake);
        let ffmpeg = self.ffmpeg.clone();
        let ext = extension.clone();

        // TempDir 移進 blocking 任務，結束（含 panic）時一併刪除
        let result = tokio::task::spawn_blocking(move || {
            let outcome = analyze_file(&dir, &input, &ext, &ffmpeg, &deepfake);
            drop(dir);
            outcome
        })
        .await
        .map_err(|e| GuardError::processing(format!("analysis task failed: {}", e)))??;

        Ok(MediaAnalysis {
            file_type: extension,
            result,
        })
    }
}

fn analyze_file(
    dir: &TempDir,
    input: &Path,
    extension: &str,
    ffmpeg: &FfmpegExtractor,
    deepfake: &DeepfakeScorer,
) -> Result<DetectionResult> {
    let audio_path = if VIDEO_EXTENSIONS.contains(&extension) {
        let wav = dir.path().join("audio.wav");
        ffmpeg.extract_audio(input, &wav)?;
        wav
    } else {
        input.to_path_buf()
    };

    let normalized = normalize_file(&audio_path)?;
    let result = deepfake.score(&normalized.clip)?;
    if result.is_error() {
        return Ok(result);
    }
    Ok(result.with_audio_metadata(normalized.source_sample_rate, &normalized.clip))
}

fn extension_from_url(url: &Url) -> Option<&'static str> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_MEDIA_EXTENSIONS
        .iter()
        .copied()
        .find(|supported| *supported == ext)
}

pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let ext = match mime.as_str() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/ogg" | "application/ogg" => "ogg",
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
        "video/mp4" => "mp4",
        "video/webm" | "audio/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-msvideo" | "video/avi" => "avi",
        _ => return None,
    };
    Some(ext)
}
