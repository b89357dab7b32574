use crate::{
    classify::{
        ClassificationResult, ClassifyOptions, ClassifyPipeline, ClassifyStatus, SessionSnapshot,
    },
    image::ImageLoader,
    utils::error::ClassifyError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{multipart::Field, Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64编码的图像数据
    pub image: String,

    /// 返回结果数量
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// 分析当前图像的请求体
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: String,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// 开发模式下记录处理进度
fn progress_channel(
    state: &AppState,
    request_id: &str,
) -> Option<mpsc::UnboundedSender<ClassifyStatus>> {
    if !state.config.dev_mode {
        return None;
    }

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<ClassifyStatus>();
    let request_id = request_id.to_string();
    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            tracing::debug!(
                "Classify Progress [{}]: {:?} - {:.1}% - {}",
                request_id,
                status.stage,
                status.progress * 100.0,
                status.message
            );
        }
    });

    Some(status_tx)
}

/// 读取并校验上传的图像字段
async fn read_image_field(field: Field<'_>) -> Result<(Bytes, Option<String>)> {
    let content_type = field.content_type().map(str::to_string);
    let file_name = field.file_name().map(str::to_string);
    let data = field
        .bytes()
        .await
        .map_err(|e| ClassifyError::InvalidInput(format!("Failed to read file data: {}", e)))?;

    // 浏览器在未选择文件时也会提交一个空的文件字段
    if data.is_empty() {
        return Err(ClassifyError::NoFileSelected);
    }

    // 验证内容类型
    if let Some(content_type) = content_type {
        if !content_type.starts_with("image/") {
            return Err(ClassifyError::UnsupportedFormat(content_type));
        }
    }

    tracing::debug!("Received file: {} bytes", data.len());
    Ok((data, file_name))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ClassifyError {
    ClassifyError::InvalidInput(format!("Failed to read multipart field: {}", e))
}

/// 选择图像：解码后替换当前图像
pub async fn upload_image_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<SessionSnapshot>>> {
    tracing::info!("Processing image selection: request_id={}", request_id);

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("unknown").to_string();
        if field_name == "file" {
            upload = Some(read_image_field(field).await?);
        } else {
            tracing::debug!("Ignoring unknown field: {}", field_name);
        }
    }

    let (data, file_name) = upload.ok_or(ClassifyError::NoFileSelected)?;
    let raster =
        ImageLoader::from_bytes_with_limit(&data, state.config.server_config.max_request_size)?;
    let snapshot = state.session.load_image(raster, file_name);

    Ok(Json(ApiResponse::success(snapshot, request_id)))
}

/// 分析当前图像
pub async fn analyze_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<AnalyzeRequest>,
) -> Result<Json<ApiResponse<ClassificationResult>>> {
    let start_time = Instant::now();
    tracing::info!(
        "Processing analyze request: request_id={}, top_k={:?}",
        request_id,
        request.top_k
    );

    let options = ClassifyOptions {
        top_k: request.top_k,
    };
    let status_tx = progress_channel(&state, &request_id);
    let result = state
        .session
        .analyze(&state.models, options, status_tx)
        .await?;

    tracing::info!(
        "Analyze completed: request_id={}, predictions={}, time={:.3}s",
        request_id,
        result.predictions.len(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

/// 当前会话状态
pub async fn session_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
) -> Json<ApiResponse<SessionSnapshot>> {
    Json(ApiResponse::success(state.session.snapshot(), request_id))
}

/// JSON base64 一次性分类
pub async fn classify_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Json<ApiResponse<ClassificationResult>>> {
    let start_time = Instant::now();
    tracing::info!(
        "Processing JSON classify request: request_id={}, top_k={:?}",
        request_id,
        request.top_k
    );

    let options = ClassifyOptions {
        top_k: request.top_k,
    };
    let status_tx = progress_channel(&state, &request_id);
    let result =
        ClassifyPipeline::process_base64(&state.models, &request.image, options, status_tx).await?;

    tracing::info!(
        "JSON classify completed: request_id={}, predictions={}, time={:.3}s",
        request_id,
        result.predictions.len(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

/// Multipart 一次性分类
pub async fn classify_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ClassificationResult>>> {
    let start_time = Instant::now();
    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<Bytes> = None;
    let mut options = ClassifyOptions::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                let (data, _) = read_image_field(field).await?;
                image_data = Some(data);
            }
            "top_k" => {
                let value = field.text().await.map_err(multipart_error)?;
                let top_k = value.trim().parse::<usize>().map_err(|_| {
                    ClassifyError::InvalidInput(format!("Invalid top_k: {}", value))
                })?;
                if !(1..=crate::web::extractors::MAX_TOP_K).contains(&top_k) {
                    return Err(ClassifyError::InvalidInput(format!(
                        "top_k must be between 1 and {}",
                        crate::web::extractors::MAX_TOP_K
                    )));
                }
                options.top_k = Some(top_k);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data.ok_or(ClassifyError::NoFileSelected)?;

    let status_tx = progress_channel(&state, &request_id);
    let result =
        ClassifyPipeline::process_bytes(&state.models, &image_data, options, status_tx).await?;

    tracing::info!(
        "Upload classify completed: request_id={}, predictions={}, time={:.3}s",
        request_id,
        result.predictions.len(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}
