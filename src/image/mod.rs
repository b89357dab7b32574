pub mod raster;
pub mod loader;
pub mod preprocessing;
pub mod postprocessing;
pub mod transforms;

pub use raster::{RasterImage, RasterSurface};
pub use loader::ImageLoader;
pub use preprocessing::{ImagePreprocessor, InputTensor};
pub use postprocessing::{Prediction, ResultFormatter};
pub use transforms::{CropBox, ImageTransforms};
