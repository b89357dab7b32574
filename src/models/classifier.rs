use crate::config::TensorLayout;
use crate::image::InputTensor;
use crate::models::ClassLabels;
use crate::utils::error::ClassifyError;
use crate::{Config, Result};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// 原始模型输出，每个类别一个分数
pub type ScoreVector = Vec<f32>;

/// 已加载的分类模型句柄
pub trait ImageClassifier: Send + Sync {
    /// 前向推理，返回未经归一化的分数
    fn predict(&self, tensor: InputTensor) -> Result<ScoreVector>;

    fn label_for(&self, index: usize) -> String;

    fn num_classes(&self) -> usize;

    fn name(&self) -> &str;
}

pub struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
    input_name: String,  // 动态发现的输入名称
    output_name: String, // 动态发现的输出名称
    layout: TensorLayout,
    labels: ClassLabels,
    name: String,
}

impl OnnxClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = config.model_path();

        if !model_path.exists() {
            return Err(ClassifyError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        let labels = ClassLabels::load(&config.metadata_path(), &config.labels_path())?;

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?
            .with_optimization_level(Self::optimization_level(config))
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?
            .with_intra_threads(config.onnx_config.intra_threads)
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(ClassifyError::ModelLoad(
                    "Classification model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(ClassifyError::ModelLoad(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        tracing::info!(
            "Classification model input: '{}', output: '{}', {} labels",
            input_name,
            output_name,
            labels.len()
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            layout: config.classifier_config.input_layout,
            labels,
            name: config.model_name.clone(),
        })
    }

    fn optimization_level(config: &Config) -> GraphOptimizationLevel {
        if !config.onnx_config.enable_optimization {
            return GraphOptimizationLevel::Disable;
        }
        match config.onnx_config.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        }
    }
}

impl ImageClassifier for OnnxClassifier {
    fn predict(&self, tensor: InputTensor) -> Result<ScoreVector> {
        let input_tensor = Tensor::from_array(tensor.into_layout(self.layout))?;

        // 推理 - 在锁内提取数据避免生命周期冲突
        let predictions = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(ClassifyError::Inference(format!(
                        "Classification output '{}' not found. Available outputs: {:?}",
                        self.output_name, available_outputs
                    )));
                }
            }
        };

        let shape = predictions.shape().to_vec();
        let batch = if shape.len() > 1 { shape[0] } else { 1 };
        if batch != 1 {
            return Err(ClassifyError::Inference(format!(
                "Expected batch size 1 for classification, got shape {:?}",
                shape
            )));
        }

        let scores: ScoreVector = predictions.iter().copied().collect();
        if scores.len() != self.labels.len() {
            tracing::warn!(
                "Model produced {} scores but {} labels are known",
                scores.len(),
                self.labels.len()
            );
        }

        Ok(scores)
    }

    fn label_for(&self, index: usize) -> String {
        self.labels.label_for(index)
    }

    fn num_classes(&self) -> usize {
        self.labels.len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
