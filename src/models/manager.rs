use crate::image::preprocessing::INPUT_SIZE;
use crate::models::{ImageClassifier, OnnxClassifier};
use crate::utils::error::ClassifyError;
use crate::{Config, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// 模型加载状态
#[derive(Clone)]
pub enum ModelState {
    /// 正在后台加载
    Pending,
    Ready(Arc<dyn ImageClassifier>),
    Failed(String),
}

impl ModelState {
    pub fn status(&self) -> &'static str {
        match self {
            ModelState::Pending => "loading",
            ModelState::Ready(_) => "ready",
            ModelState::Failed(_) => "failed",
        }
    }
}

/// 模型管理器，作为应用状态的一部分注入到处理器中
pub struct ModelManager {
    state: RwLock<ModelState>,
    config: Config,
}

impl ModelManager {
    pub fn new(config: Config) -> Self {
        Self {
            state: RwLock::new(ModelState::Pending),
            config,
        }
    }

    /// 直接使用已加载的模型
    pub fn with_classifier(config: Config, classifier: Arc<dyn ImageClassifier>) -> Self {
        Self {
            state: RwLock::new(ModelState::Ready(classifier)),
            config,
        }
    }

    /// 在阻塞线程池中加载模型，完成后切换状态
    pub fn spawn_load(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            tracing::info!("Loading model '{}' in background...", manager.config.model_name);
            match OnnxClassifier::new(&manager.config) {
                Ok(classifier) => manager.set_ready(Arc::new(classifier)),
                Err(e) => manager.set_failed(e.to_string()),
            }
        })
    }

    pub fn set_ready(&self, classifier: Arc<dyn ImageClassifier>) {
        tracing::info!(
            "Model '{}' ready with {} classes",
            classifier.name(),
            classifier.num_classes()
        );
        *self.state.write() = ModelState::Ready(classifier);
    }

    pub fn set_failed(&self, reason: String) {
        tracing::error!("Failed to load model: {}", reason);
        *self.state.write() = ModelState::Failed(reason);
    }

    pub fn state(&self) -> ModelState {
        self.state.read().clone()
    }

    /// 获取已加载的分类器，未就绪时返回 ModelNotReady
    pub fn classifier(&self) -> Result<Arc<dyn ImageClassifier>> {
        match &*self.state.read() {
            ModelState::Ready(classifier) => Ok(Arc::clone(classifier)),
            ModelState::Pending => Err(ClassifyError::ModelNotReady),
            ModelState::Failed(reason) => Err(ClassifyError::ModelLoad(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), ModelState::Ready(_))
    }

    /// 获取配置引用
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 获取模型统计信息
    pub fn get_stats(&self) -> ModelStats {
        let state = self.state();
        let (model_name, num_classes, error) = match &state {
            ModelState::Ready(classifier) => {
                (classifier.name().to_string(), Some(classifier.num_classes()), None)
            }
            ModelState::Pending => (self.config.model_name.clone(), None, None),
            ModelState::Failed(reason) => (self.config.model_name.clone(), None, Some(reason.clone())),
        };

        ModelStats {
            model_name,
            status: state.status(),
            num_classes,
            error,
            top_k: self.config.classifier_config.top_k,
            input_size: INPUT_SIZE,
            intra_threads: self.config.onnx_config.intra_threads,
            optimization_level: self.config.onnx_config.optimization_level,
        }
    }
}

/// 模型统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub model_name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub top_k: usize,
    pub input_size: usize,
    pub intra_threads: usize,
    pub optimization_level: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::tests::FixedClassifier;

    fn config(models_dir: &str) -> Config {
        Config::new(
            "127.0.0.1:0".to_string(),
            models_dir.to_string(),
            "mobilenet-v3".to_string(),
            Some(1),
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_pending_is_not_ready() {
        let manager = ModelManager::new(config("models"));
        assert!(!manager.is_ready());
        assert!(matches!(manager.classifier(), Err(ClassifyError::ModelNotReady)));
        assert_eq!(manager.get_stats().status, "loading");
    }

    #[test]
    fn test_ready_after_set() {
        let manager = ModelManager::new(config("models"));
        manager.set_ready(Arc::new(FixedClassifier::new(vec![0.1, 0.2])));
        assert!(manager.is_ready());
        let stats = manager.get_stats();
        assert_eq!(stats.status, "ready");
        assert_eq!(stats.num_classes, Some(2));
    }

    #[test]
    fn test_failed_reports_reason() {
        let manager = ModelManager::new(config("models"));
        manager.set_failed("boom".to_string());
        assert!(matches!(manager.classifier(), Err(ClassifyError::ModelLoad(r)) if r == "boom"));
        assert_eq!(manager.get_stats().error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_background_load_of_missing_model_fails() {
        let dir = std::env::temp_dir().join(format!("models-{}", uuid::Uuid::new_v4()));
        let manager = Arc::new(ModelManager::new(config(&dir.display().to_string())));
        manager.spawn_load().await.unwrap();
        assert_eq!(manager.state().status(), "failed");
    }
}
