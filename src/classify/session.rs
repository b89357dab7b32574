//! 页面状态：当前图像与当前结果各只保留一份，新的操作整体替换旧值。

use crate::{
    classify::{ClassificationResult, ClassifyOptions, ClassifyPipeline, ClassifyStatus},
    image::{RasterImage, RasterSurface},
    models::ModelManager,
    utils::error::ClassifyError,
    Result,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Idle -> ImageLoaded -> Analyzing -> Results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    ImageLoaded,
    Analyzing,
    Results,
}

/// 当前图像的基本信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub width: usize,
    pub height: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// 返回给页面的会话快照
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ClassificationResult>,
}

struct SessionInner {
    phase: SessionPhase,
    image: Option<(Arc<RasterImage>, ImageInfo)>,
    results: Option<ClassificationResult>,
    /// 每次上传或分析递增，过期的分析不再写回结果
    generation: u64,
}

/// 一次进行中的分析
///
/// 未经 complete/fail 结算就被丢弃时（请求超时或客户端断开），恢复到分析开始前的状态。
struct AnalysisTicket<'a> {
    session: &'a AnalysisSession,
    generation: u64,
    prior_phase: SessionPhase,
    image: Arc<RasterImage>,
    settled: bool,
}

impl Drop for AnalysisTicket<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut inner = self.session.inner.lock();
        if inner.generation == self.generation && inner.phase == SessionPhase::Analyzing {
            tracing::warn!("Analysis generation {} cancelled", self.generation);
            inner.phase = self.prior_phase;
        }
    }
}

pub struct AnalysisSession {
    inner: Mutex<SessionInner>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Idle,
                image: None,
                results: None,
                generation: 0,
            }),
        }
    }

    /// 替换当前图像，进行中的分析随之作废
    pub fn load_image(&self, raster: RasterImage, file_name: Option<String>) -> SessionSnapshot {
        let info = ImageInfo {
            width: raster.width(),
            height: raster.height(),
            file_name,
        };

        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.image = Some((Arc::new(raster), info.clone()));
        inner.phase = SessionPhase::ImageLoaded;

        tracing::info!(
            "Image loaded: {}x{} {}",
            info.width,
            info.height,
            info.file_name.as_deref().unwrap_or("")
        );

        Self::snapshot_locked(&inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        Self::snapshot_locked(&self.inner.lock())
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    /// 对当前图像执行分析
    ///
    /// 没有图像时返回 NoFileSelected，模型未就绪时返回 ModelNotReady，两者都不改变已有结果。
    /// 新的分析请求会让尚未完成的旧请求返回 AnalysisSuperseded。
    pub async fn analyze(
        &self,
        models: &ModelManager,
        options: ClassifyOptions,
        status_tx: Option<mpsc::UnboundedSender<ClassifyStatus>>,
    ) -> Result<ClassificationResult> {
        let mut ticket = self.begin_analysis()?;

        let classifier = match models.classifier() {
            Ok(classifier) => classifier,
            Err(e) => return Err(self.fail_analysis(&mut ticket, e)),
        };

        let top_k = options.resolve_top_k(models.config().classifier_config.top_k);
        let outcome =
            ClassifyPipeline::process_raster(classifier, Arc::clone(&ticket.image), top_k, status_tx).await;

        match outcome {
            Ok(result) => self.complete_analysis(&mut ticket, result),
            Err(e) => Err(self.fail_analysis(&mut ticket, e)),
        }
    }

    fn begin_analysis(&self) -> Result<AnalysisTicket<'_>> {
        let mut inner = self.inner.lock();

        let image = match &inner.image {
            Some((image, _)) => Arc::clone(image),
            None => return Err(ClassifyError::NoFileSelected),
        };

        // 进行中的分析被新请求取代时，恢复到它开始前的状态
        let prior_phase = match inner.phase {
            SessionPhase::Analyzing if inner.results.is_some() => SessionPhase::Results,
            SessionPhase::Analyzing => SessionPhase::ImageLoaded,
            phase => phase,
        };

        inner.generation += 1;
        inner.phase = SessionPhase::Analyzing;

        Ok(AnalysisTicket {
            session: self,
            generation: inner.generation,
            prior_phase,
            image,
            settled: false,
        })
    }

    fn complete_analysis(
        &self,
        ticket: &mut AnalysisTicket<'_>,
        result: ClassificationResult,
    ) -> Result<ClassificationResult> {
        ticket.settled = true;
        let mut inner = self.inner.lock();
        if inner.generation != ticket.generation {
            tracing::debug!("Discarding stale analysis generation {}", ticket.generation);
            return Err(ClassifyError::AnalysisSuperseded);
        }

        inner.results = Some(result.clone());
        inner.phase = SessionPhase::Results;
        Ok(result)
    }

    fn fail_analysis(&self, ticket: &mut AnalysisTicket<'_>, error: ClassifyError) -> ClassifyError {
        ticket.settled = true;
        let mut inner = self.inner.lock();
        if inner.generation != ticket.generation {
            return ClassifyError::AnalysisSuperseded;
        }

        tracing::warn!("Analysis failed: {}", error);
        inner.phase = ticket.prior_phase;
        error
    }

    fn snapshot_locked(inner: &SessionInner) -> SessionSnapshot {
        SessionSnapshot {
            phase: inner.phase,
            image: inner.image.as_ref().map(|(_, info)| info.clone()),
            results: inner.results.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::InputTensor;
    use crate::models::classifier::tests::FixedClassifier;
    use crate::models::{ImageClassifier, ScoreVector};
    use crate::Config;
    use std::time::Duration;

    /// 推理前先阻塞一段时间的测试模型
    struct SlowClassifier {
        inner: FixedClassifier,
        delay: Duration,
    }

    impl ImageClassifier for SlowClassifier {
        fn predict(&self, tensor: InputTensor) -> Result<ScoreVector> {
            std::thread::sleep(self.delay);
            self.inner.predict(tensor)
        }

        fn label_for(&self, index: usize) -> String {
            self.inner.label_for(index)
        }

        fn num_classes(&self) -> usize {
            self.inner.num_classes()
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn config() -> Config {
        Config::new(
            "127.0.0.1:0".to_string(),
            "models".to_string(),
            "fixed".to_string(),
            Some(1),
            false,
        )
        .unwrap()
    }

    fn ready_models() -> ModelManager {
        ModelManager::with_classifier(config(), Arc::new(FixedClassifier::new(vec![0.1, 0.9, 0.3])))
    }

    fn raster() -> RasterImage {
        RasterImage::filled(32, 16, [10, 20, 30]).unwrap()
    }

    #[test]
    fn test_starts_idle() {
        let session = AnalysisSession::new();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert!(snapshot.image.is_none());
        assert!(snapshot.results.is_none());
    }

    #[tokio::test]
    async fn test_analyze_without_image() {
        let session = AnalysisSession::new();
        let err = session
            .analyze(&ready_models(), ClassifyOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::NoFileSelected));
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.snapshot().results.is_none());
    }

    #[tokio::test]
    async fn test_full_flow() {
        let session = AnalysisSession::new();
        let snapshot = session.load_image(raster(), Some("cat.png".to_string()));
        assert_eq!(snapshot.phase, SessionPhase::ImageLoaded);
        assert_eq!(snapshot.image.unwrap().width, 32);

        let result = session
            .analyze(&ready_models(), ClassifyOptions { top_k: Some(2) }, None)
            .await
            .unwrap();
        assert_eq!(result.predictions.len(), 2);
        assert_eq!(result.predictions[0].class_index, 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Results);
        assert_eq!(snapshot.results.unwrap().predictions, result.predictions);
    }

    #[tokio::test]
    async fn test_model_not_ready_keeps_prior_state() {
        let session = AnalysisSession::new();
        session.load_image(raster(), None);

        let err = session
            .analyze(&ModelManager::new(config()), ClassifyOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::ModelNotReady));
        assert_eq!(session.phase(), SessionPhase::ImageLoaded);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_results() {
        let session = AnalysisSession::new();
        session.load_image(raster(), None);
        let models = ready_models();
        let first = session
            .analyze(&models, ClassifyOptions::default(), None)
            .await
            .unwrap();

        let empty = ModelManager::with_classifier(config(), Arc::new(FixedClassifier::new(Vec::new())));
        let err = session
            .analyze(&empty, ClassifyOptions::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(_)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Results);
        assert_eq!(snapshot.results.unwrap().predictions, first.predictions);
    }

    #[test]
    fn test_newer_analysis_supersedes_pending() {
        let session = AnalysisSession::new();
        session.load_image(raster(), None);

        let mut first = session.begin_analysis().unwrap();
        let mut second = session.begin_analysis().unwrap();
        assert_eq!(first.prior_phase, SessionPhase::ImageLoaded);
        assert_eq!(second.prior_phase, SessionPhase::ImageLoaded);

        let result = ClassificationResult {
            processing_time: 0.0,
            predictions: Vec::new(),
            model_info: None,
        };
        assert!(matches!(
            session.complete_analysis(&mut first, result.clone()),
            Err(ClassifyError::AnalysisSuperseded)
        ));
        assert_eq!(session.phase(), SessionPhase::Analyzing);

        session.complete_analysis(&mut second, result).unwrap();
        assert_eq!(session.phase(), SessionPhase::Results);
    }

    #[test]
    fn test_new_upload_supersedes_pending_analysis() {
        let session = AnalysisSession::new();
        session.load_image(raster(), None);
        let mut ticket = session.begin_analysis().unwrap();

        session.load_image(RasterImage::filled(8, 8, [0, 0, 0]).unwrap(), None);
        let err = session.fail_analysis(&mut ticket, ClassifyError::Inference("late".to_string()));
        assert!(matches!(err, ClassifyError::AnalysisSuperseded));
        assert_eq!(session.phase(), SessionPhase::ImageLoaded);
        assert_eq!(session.snapshot().image.unwrap().width, 8);
    }

    #[tokio::test]
    async fn test_cancelled_analysis_restores_phase() {
        let session = AnalysisSession::new();
        session.load_image(raster(), None);
        let models = ModelManager::with_classifier(
            config(),
            Arc::new(SlowClassifier {
                inner: FixedClassifier::new(vec![0.1, 0.9, 0.3]),
                delay: Duration::from_millis(200),
            }),
        );

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            session.analyze(&models, ClassifyOptions::default(), None),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(session.phase(), SessionPhase::ImageLoaded);
        assert!(session.snapshot().results.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_analysis_keeps_previous_results() {
        let session = AnalysisSession::new();
        session.load_image(raster(), None);
        let first = session
            .analyze(&ready_models(), ClassifyOptions::default(), None)
            .await
            .unwrap();

        let models = ModelManager::with_classifier(
            config(),
            Arc::new(SlowClassifier {
                inner: FixedClassifier::new(vec![0.9, 0.1, 0.3]),
                delay: Duration::from_millis(200),
            }),
        );
        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            session.analyze(&models, ClassifyOptions::default(), None),
        )
        .await;
        assert!(outcome.is_err());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Results);
        assert_eq!(snapshot.results.unwrap().predictions, first.predictions);
    }
}
