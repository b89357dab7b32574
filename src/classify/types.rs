use serde::Deserialize;

/// 分类处理选项
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyOptions {
    /// 返回结果数量，缺省使用配置中的 top_k
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl ClassifyOptions {
    pub fn resolve_top_k(&self, default_top_k: usize) -> usize {
        self.top_k.unwrap_or(default_top_k)
    }
}

/// 分类处理阶段
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifyStage {
    Loading,
    Preprocessing,
    Inference,
    Postprocessing,
    Completed,
}

/// 分类处理状态
#[derive(Debug, Clone)]
pub struct ClassifyStatus {
    /// 当前处理阶段
    pub stage: ClassifyStage,
    /// 进度百分比 (0.0 - 1.0)
    pub progress: f32,
    /// 状态消息
    pub message: String,
}

impl ClassifyStatus {
    pub fn new(stage: ClassifyStage, progress: f32, message: &str) -> Self {
        Self {
            stage,
            progress,
            message: message.to_string(),
        }
    }
}

// 重新导出主要类型
pub use crate::image::postprocessing::{ClassificationResult, ModelInfo, Prediction};
