use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

/// 单次请求允许的最大 top_k
pub const MAX_TOP_K: usize = 1000;

/// 验证的JSON提取器
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: for<'de> Deserialize<'de> + Validate,
    S: Send + Sync,
{
    type Rejection = ValidationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| ValidationError::JsonParse(err.body_text()))?;

        value.validate().map_err(ValidationError::Validation)?;

        Ok(ValidatedJson(value))
    }
}

/// 验证trait
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// 验证错误类型
#[derive(Debug)]
pub enum ValidationError {
    JsonParse(String),
    Validation(String),
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let (code, error_message) = match &self {
            ValidationError::JsonParse(_) => ("JSON_ERROR", self.to_string()),
            ValidationError::Validation(_) => ("VALIDATION_ERROR", self.to_string()),
        };

        tracing::warn!("Request rejected: {}", error_message);

        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": error_message
            }
        });

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::JsonParse(msg) => write!(f, "JSON parse error: {}", msg),
            ValidationError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn validate_top_k(top_k: Option<usize>) -> Result<(), String> {
    match top_k {
        Some(k) if !(1..=MAX_TOP_K).contains(&k) => {
            Err(format!("top_k must be between 1 and {}", MAX_TOP_K))
        }
        _ => Ok(()),
    }
}

impl Validate for crate::web::handlers::ClassifyJsonRequest {
    fn validate(&self) -> Result<(), String> {
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }

        validate_top_k(self.top_k)
    }
}

impl Validate for crate::web::handlers::AnalyzeRequest {
    fn validate(&self) -> Result<(), String> {
        validate_top_k(self.top_k)
    }
}

/// 请求ID提取器，优先使用客户端传入的 X-Request-ID
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::handlers::{AnalyzeRequest, ClassifyJsonRequest};

    #[test]
    fn test_classify_request_validation() {
        let ok = ClassifyJsonRequest {
            image: "aGVsbG8=".to_string(),
            top_k: Some(5),
        };
        assert!(ok.validate().is_ok());

        let empty = ClassifyJsonRequest {
            image: "  ".to_string(),
            top_k: None,
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_top_k_bounds() {
        assert!(AnalyzeRequest { top_k: None }.validate().is_ok());
        assert!(AnalyzeRequest { top_k: Some(1) }.validate().is_ok());
        assert!(AnalyzeRequest { top_k: Some(MAX_TOP_K) }.validate().is_ok());
        assert!(AnalyzeRequest { top_k: Some(0) }.validate().is_err());
        assert!(AnalyzeRequest { top_k: Some(MAX_TOP_K + 1) }.validate().is_err());
    }

    #[tokio::test]
    async fn test_request_id_from_header() {
        let (mut parts, _) = axum::http::Request::builder()
            .header("X-Request-ID", "abc-123")
            .body(())
            .unwrap()
            .into_parts();
        let RequestId(id) = RequestId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, "abc-123");
    }
}
