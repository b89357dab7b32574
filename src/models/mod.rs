pub mod labels;
pub mod classifier;
pub mod manager;

pub use labels::ClassLabels;
pub use classifier::{ImageClassifier, OnnxClassifier, ScoreVector};
pub use manager::{ModelManager, ModelState, ModelStats};
