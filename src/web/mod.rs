pub mod handlers;
pub mod middleware;
pub mod extractors;
pub mod ui;

use crate::{
    classify::AnalysisSession, models::ModelManager, utils::error::ClassifyError, Config, Result,
};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 注入到所有处理器的应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub models: Arc<ModelManager>,
    pub session: Arc<AnalysisSession>,
}

impl AppState {
    pub fn new(config: Config, models: Arc<ModelManager>) -> Self {
        Self {
            config,
            models,
            session: Arc::new(AnalysisSession::new()),
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // 模型在后台加载，服务立即开始接受请求
    let models = Arc::new(ModelManager::new(config.clone()));
    models.spawn_load();

    let state = AppState::new(config.clone(), models);
    let app = create_app(state);

    // 解析绑定地址
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        ClassifyError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /                 - Web UI");
    tracing::info!("  POST /api/image        - Select image (multipart)");
    tracing::info!("  POST /api/analyze      - Analyze selected image");
    tracing::info!("  GET  /api/session      - Current image and results");
    tracing::info!("  POST /classify         - One-shot JSON base64 upload");
    tracing::info!("  POST /classify/upload  - One-shot multipart upload");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  GET  /api/info         - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        ClassifyError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ClassifyError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let max_request_size = state.config.server_config.max_request_size;
    let request_timeout = state.config.server_config.request_timeout;

    Router::new()
        // 页面会话路由
        .route("/api/image", post(handlers::upload_image_handler))
        .route("/api/analyze", post(handlers::analyze_handler))
        .route("/api/session", get(handlers::session_handler))
        // 一次性分类API
        .route("/classify", post(handlers::classify_json_handler))
        .route("/classify/upload", post(handlers::classify_upload_handler))
        // Web UI路由
        .route("/", get(ui::index_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let status = match state.models.classifier() {
        Ok(_) => "healthy",
        Err(ClassifyError::ModelNotReady) => "starting",
        Err(e) => return Err(e),
    };

    Ok(Json(json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.models.get_stats();
    Json(json!({
        "service": "ONNX Image Classification Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": stats,
        "input": {
            "size": crate::image::preprocessing::INPUT_SIZE,
            "layout": state.config.classifier_config.input_layout,
        }
    }))
}
