use crate::utils::error::{GuardError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 上傳與下載允許的副檔名
pub const SUPPORTED_MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "mp4", "avi", "mov", "flac", "ogg", "m4a", "webm",
];

/// 需要先抽出音軌的容器格式
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "webm"];

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(GuardError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(GuardError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(GuardError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(GuardError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GuardError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed.iter().copied().collect();
    if !allowed_set.contains(value) {
        return Err(GuardError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Allowed values: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

/// 檢查上傳檔名，回傳小寫副檔名
pub fn validate_upload_filename(filename: &str) -> Result<String> {
    if filename.trim().is_empty() {
        return Err(GuardError::input("No file selected"));
    }

    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| GuardError::input("File type not supported"))?;

    if !SUPPORTED_MEDIA_EXTENSIONS.contains(&extension.as_str()) {
        return Err(GuardError::input("File type not supported"));
    }

    Ok(extension)
}

/// 請求裡帶來的遠端網址，只接受 http/https
pub fn validate_request_url(url_str: &str) -> Result<Url> {
    if url_str.trim().is_empty() {
        return Err(GuardError::input("No URL provided"));
    }

    let url = Url::parse(url_str.trim())
        .map_err(|e| GuardError::input(format!("Invalid URL format: {}", e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(GuardError::input(format!(
            "Unsupported URL scheme: {}",
            scheme
        ))),
    }
}
