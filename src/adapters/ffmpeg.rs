use crate::core::audio::TARGET_SAMPLE_RATE;
use crate::utils::error::{GuardError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Demuxes the audio track of a video container with an external `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    binary: PathBuf,
}

impl FfmpegExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// 直接輸出 mono 16 kHz WAV，解碼時就不必再重取樣
    pub fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        debug!("ffmpeg: {} -> {}", input.display(), output.display());
        let result = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(TARGET_SAMPLE_RATE.to_string())
            .args(["-f", "wav"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                GuardError::decode(format!(
                    "cannot run {} (is ffmpeg installed?): {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(GuardError::decode(format!(
                "ffmpeg could not extract audio: {}",
                last_line
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_a_decode_error() {
        let ffmpeg = FfmpegExtractor::new("/nonexistent/ffmpeg");
        assert!(!ffmpeg.is_available());
        let err = ffmpeg
            .extract_audio(Path::new("in.mp4"), Path::new("out.wav"))
            .unwrap_err();
        assert_eq!(err.category(), crate::utils::error::ErrorCategory::Decode);
    }
}
