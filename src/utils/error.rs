use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("{message}")]
    InputError { message: String },

    #[error("Feature extraction failed: {message}")]
    FeatureExtractionError { message: String },

    #[error("{model} unavailable: {reason}")]
    ModelUnavailableError { model: String, reason: String },

    #[error("Audio decode failed: {message}")]
    DecodeError { message: String },

    #[error("Inference failed: {message}")]
    InferenceError { message: String },

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Extraction,
    ModelUnavailable,
    TransientFetch,
    Decode,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GuardError {
    pub fn input(message: impl Into<String>) -> Self {
        GuardError::InputError {
            message: message.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        GuardError::FeatureExtractionError {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        GuardError::DecodeError {
            message: message.into(),
        }
    }

    pub fn inference(message: impl Into<String>) -> Self {
        GuardError::InferenceError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        GuardError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GuardError::InputError { .. } => ErrorCategory::Input,
            GuardError::FeatureExtractionError { .. } => ErrorCategory::Extraction,
            GuardError::ModelUnavailableError { .. } => ErrorCategory::ModelUnavailable,
            GuardError::ApiError(_) => ErrorCategory::TransientFetch,
            GuardError::DecodeError { .. } => ErrorCategory::Decode,
            GuardError::ConfigError { .. }
            | GuardError::MissingConfigError { .. }
            | GuardError::InvalidConfigValueError { .. }
            | GuardError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            GuardError::InferenceError { .. }
            | GuardError::IoError(_)
            | GuardError::SerializationError(_)
            | GuardError::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::TransientFetch => ErrorSeverity::Low,
            ErrorCategory::ModelUnavailable => ErrorSeverity::Medium,
            ErrorCategory::Extraction | ErrorCategory::Decode | ErrorCategory::Internal => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Input => StatusCode::BAD_REQUEST,
            ErrorCategory::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::TransientFetch => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 給使用者看的訊息（不含內部細節）
    pub fn user_friendly_message(&self) -> String {
        match self {
            GuardError::InputError { message } => message.clone(),
            GuardError::ConfigError { .. }
            | GuardError::MissingConfigError { .. }
            | GuardError::InvalidConfigValueError { .. }
            | GuardError::ConfigValidationError { .. } => {
                format!("Configuration problem: {}", self)
            }
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check the request payload and try again",
            ErrorCategory::Extraction => "Inspect the URL and the server logs for the failing feature",
            ErrorCategory::ModelUnavailable => {
                "Verify the model paths in the config and restart the server"
            }
            ErrorCategory::TransientFetch => "The remote host may be down; retry later",
            ErrorCategory::Decode => "Make sure the file is a valid audio/video clip (ffmpeg must be installed for video)",
            ErrorCategory::Configuration => "Fix the configuration file or command line flags",
            ErrorCategory::Internal => "Check the server logs for details",
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                self,
                self.category(),
                self.severity()
            );
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        let body = serde_json::json!({
            "success": false,
            "error": self.user_friendly_message(),
        });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_map_to_bad_request() {
        let err = GuardError::input("No URL provided");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_friendly_message(), "No URL provided");
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_decode_and_extraction_errors_are_server_errors() {
        assert_eq!(
            GuardError::decode("bad header").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GuardError::extraction("empty record").category(),
            ErrorCategory::Extraction
        );
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = GuardError::MissingConfigError {
            field: "phishing.model_path".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("phishing.model_path"));
    }
}
