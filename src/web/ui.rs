use axum::response::{Html, IntoResponse};

/// 首页：上传、预览、分析、结果列表
pub async fn index_handler() -> impl IntoResponse {
    Html(include_str!("../../templates/index.html"))
}
