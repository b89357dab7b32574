use crate::utils::error::ClassifyError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件目录
    pub models_dir: PathBuf,

    /// 模型名称（models_dir 下的子目录）
    pub model_name: String,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 分类器配置
    pub classifier_config: ClassifierConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,

    /// 启用图优化
    pub enable_optimization: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// 默认返回的结果数量
    pub top_k: usize,

    /// 模型输入张量布局
    pub input_layout: TensorLayout,
}

/// 模型输入张量的维度顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// (N, H, W, C)，TensorFlow 导出的模型
    Nhwc,
    /// (N, C, H, W)，PyTorch 导出的模型
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(ClassifyError::Config(format!(
                "Unknown input layout '{}', expected nhwc or nchw",
                other
            ))),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            input_layout: TensorLayout::Nhwc,
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        model_name: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        if model_name.trim().is_empty() {
            return Err(ClassifyError::Config("Model name cannot be empty".to_string()));
        }

        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
            enable_optimization: true,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 }, // 开发模式更长超时
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            model_name,
            workers,
            dev_mode,
            onnx_config,
            server_config,
            classifier_config: ClassifierConfig::default(),
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(ClassifyError::Config("top_k must be at least 1".to_string()));
        }
        self.classifier_config.top_k = top_k;
        Ok(self)
    }

    pub fn with_input_layout(mut self, layout: TensorLayout) -> Self {
        self.classifier_config.input_layout = layout;
        self
    }

    /// 模型目录
    pub fn model_dir(&self) -> PathBuf {
        self.models_dir.join(&self.model_name)
    }

    /// 获取分类模型路径
    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join("model.onnx")
    }

    /// 模型元数据（包含 classNames）
    pub fn metadata_path(&self) -> PathBuf {
        self.model_dir().join("metadata.json")
    }

    /// 标签文件路径，metadata.json 不存在时使用
    pub fn labels_path(&self) -> PathBuf {
        self.model_dir().join("labels.txt")
    }
}
