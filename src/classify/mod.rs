pub mod types;
pub mod pipeline;
pub mod session;

pub use types::{ClassificationResult, ClassifyOptions, ClassifyStage, ClassifyStatus, ModelInfo, Prediction};
pub use pipeline::ClassifyPipeline;
pub use session::{AnalysisSession, ImageInfo, SessionPhase, SessionSnapshot};
