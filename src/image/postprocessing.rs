use crate::utils::error::ClassifyError;
use crate::Result;
use serde::{Deserialize, Serialize};

/// 单个分类结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 模型输出中的类别下标
    pub class_index: usize,
    /// 类别名称
    pub label: String,
    /// 百分比，保留两位小数
    pub probability: f64,
}

/// 完整的分类结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// 处理耗时（秒）
    pub processing_time: f32,
    /// 按概率降序排列的结果
    pub predictions: Vec<Prediction>,
    /// 模型信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

/// 模型信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub num_classes: usize,
}

/// 结果格式化器
pub struct ResultFormatter;

impl ResultFormatter {
    /// 数值稳定的softmax
    pub fn softmax(scores: &[f32]) -> Vec<f32> {
        if scores.is_empty() {
            return Vec::new();
        }

        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
        let sum: f32 = exps.iter().sum();

        exps.into_iter().map(|e| e / sum).collect()
    }

    /// 按分数降序选出前k个下标，分数相同时下标小的在前
    pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        indexed.truncate(k);
        indexed
    }

    /// 把选中的分数换算为占全部分数之和的百分比，保留两位小数
    ///
    /// 输入已经过softmax时，这一步是对概率的第二次归一化。保留该换算以兼容已有页面的输出。
    pub fn to_percentages(selected: &[(usize, f32)], all_scores: &[f32]) -> Result<Vec<(usize, f64)>> {
        let total: f64 = all_scores.iter().map(|&s| s as f64).sum();
        if !total.is_finite() || total == 0.0 {
            return Err(ClassifyError::Inference(format!(
                "Cannot normalize scores, sum is {}",
                total
            )));
        }

        Ok(selected
            .iter()
            .map(|&(index, score)| (index, Self::round2(score as f64 / total * 100.0)))
            .collect())
    }

    /// softmax -> top-k -> 百分比 -> 附加标签
    pub fn format_predictions<F>(logits: &[f32], k: usize, label_for: F) -> Result<Vec<Prediction>>
    where
        F: Fn(usize) -> String,
    {
        if logits.is_empty() {
            return Err(ClassifyError::Inference("Model returned an empty score vector".to_string()));
        }

        let probabilities = Self::softmax(logits);
        let top = Self::top_k(&probabilities, k);
        let percentages = Self::to_percentages(&top, &probabilities)?;

        Ok(percentages
            .into_iter()
            .map(|(class_index, probability)| Prediction {
                class_index,
                label: label_for(class_index),
                probability,
            })
            .collect())
    }

    fn round2(value: f64) -> f64 {
        (value * 100.0).round() / 100.0
    }
}
