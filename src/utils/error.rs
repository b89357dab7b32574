use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Model is not ready yet, please retry once loading has finished")]
    ModelNotReady,

    #[error("No image file selected")]
    NoFileSelected,

    #[error("Analysis superseded by a newer request")]
    AnalysisSuperseded,

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<image::ImageError> for ClassifyError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => ClassifyError::UnsupportedFormat(e.to_string()),
            other => ClassifyError::Decode(other.to_string()),
        }
    }
}

impl ClassifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ClassifyError::InvalidImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ClassifyError::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
            ClassifyError::NoFileSelected => StatusCode::BAD_REQUEST,
            ClassifyError::AnalysisSuperseded => StatusCode::CONFLICT,
            ClassifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClassifyError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClassifyError::Base64(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Json(_) => StatusCode::BAD_REQUEST,
            ClassifyError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifyError::Decode(_) => "DECODE_ERROR",
            ClassifyError::InvalidImage(_) => "INVALID_IMAGE",
            ClassifyError::ModelNotReady => "MODEL_NOT_READY",
            ClassifyError::NoFileSelected => "NO_FILE_SELECTED",
            ClassifyError::AnalysisSuperseded => "ANALYSIS_SUPERSEDED",
            ClassifyError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            ClassifyError::Inference(_) => "INFERENCE_ERROR",
            ClassifyError::InvalidInput(_) => "INVALID_INPUT",
            ClassifyError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifyError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ClassifyError::Config(_) => "CONFIG_ERROR",
            ClassifyError::Io(_) => "IO_ERROR",
            ClassifyError::Json(_) => "JSON_ERROR",
            ClassifyError::Base64(_) => "BASE64_DECODE_ERROR",
            ClassifyError::Ort(_) => "ORT_ERROR",
            ClassifyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        // 用户可恢复的错误只记录警告
        if status.is_server_error() && !matches!(self, ClassifyError::ModelNotReady) {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
