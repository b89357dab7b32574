use crate::{
    classify::{ClassificationResult, ClassifyOptions, ClassifyStage, ClassifyStatus, ModelInfo},
    image::{ImageLoader, ImagePreprocessor, RasterImage, ResultFormatter},
    models::{ImageClassifier, ModelManager},
    utils::error::ClassifyError,
    Result,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// 分类处理流水线
pub struct ClassifyPipeline;

impl ClassifyPipeline {
    /// 处理base64图像
    pub async fn process_base64(
        models: &ModelManager,
        base64_data: &str,
        options: ClassifyOptions,
        status_tx: Option<mpsc::UnboundedSender<ClassifyStatus>>,
    ) -> Result<ClassificationResult> {
        let classifier = models.classifier()?;
        Self::send_status(&status_tx, ClassifyStage::Loading, 0.1, "Loading image from base64");

        let raster = ImageLoader::from_base64(base64_data)?;
        let top_k = options.resolve_top_k(models.config().classifier_config.top_k);
        Self::process_raster(classifier, Arc::new(raster), top_k, status_tx).await
    }

    /// 处理字节流图像
    pub async fn process_bytes(
        models: &ModelManager,
        bytes: &[u8],
        options: ClassifyOptions,
        status_tx: Option<mpsc::UnboundedSender<ClassifyStatus>>,
    ) -> Result<ClassificationResult> {
        let classifier = models.classifier()?;
        Self::send_status(&status_tx, ClassifyStage::Loading, 0.1, "Loading image from stream");

        let raster = ImageLoader::from_bytes_with_limit(
            bytes,
            models.config().server_config.max_request_size,
        )?;
        let top_k = options.resolve_top_k(models.config().classifier_config.top_k);
        Self::process_raster(classifier, Arc::new(raster), top_k, status_tx).await
    }

    /// 核心处理流水线：预处理和推理在阻塞线程池中执行
    pub async fn process_raster(
        classifier: Arc<dyn ImageClassifier>,
        raster: Arc<RasterImage>,
        top_k: usize,
        status_tx: Option<mpsc::UnboundedSender<ClassifyStatus>>,
    ) -> Result<ClassificationResult> {
        let start_time = Instant::now();

        let task_tx = status_tx.clone();
        let task_classifier = Arc::clone(&classifier);
        let scores = tokio::task::spawn_blocking(move || {
            Self::send_status(&task_tx, ClassifyStage::Preprocessing, 0.2, "Preprocessing image");
            let tensor = ImagePreprocessor::preprocess(raster.as_ref())?;
            let preprocess_time = start_time.elapsed();

            Self::send_status(&task_tx, ClassifyStage::Inference, 0.5, "Running model");
            let inference_start = Instant::now();
            let scores = task_classifier.predict(tensor)?;

            tracing::debug!(
                "Preprocess {:.3}s, inference {:.3}s, {} scores",
                preprocess_time.as_secs_f32(),
                inference_start.elapsed().as_secs_f32(),
                scores.len()
            );
            Ok::<_, ClassifyError>(scores)
        })
        .await
        .map_err(|e| ClassifyError::Internal(format!("Inference task failed: {}", e)))??;

        Self::send_status(&status_tx, ClassifyStage::Postprocessing, 0.9, "Selecting top predictions");
        let predictions =
            ResultFormatter::format_predictions(&scores, top_k, |i| classifier.label_for(i))?;

        let total_time = start_time.elapsed();
        Self::send_status(
            &status_tx,
            ClassifyStage::Completed,
            1.0,
            &format!("Classification completed: {} predictions", predictions.len()),
        );

        if let Some(best) = predictions.first() {
            tracing::info!(
                "Classification completed: top='{}' ({:.2}%), total_time={:.3}s",
                best.label,
                best.probability,
                total_time.as_secs_f32()
            );
        }

        Ok(ClassificationResult {
            processing_time: total_time.as_secs_f32(),
            predictions,
            model_info: Some(ModelInfo {
                model_name: classifier.name().to_string(),
                num_classes: scores.len(),
            }),
        })
    }

    fn send_status(
        status_tx: &Option<mpsc::UnboundedSender<ClassifyStatus>>,
        stage: ClassifyStage,
        progress: f32,
        message: &str,
    ) {
        if let Some(tx) = status_tx {
            let _ = tx.send(ClassifyStatus::new(stage, progress, message));
        }
    }
}
