use crate::image::RasterImage;
use crate::utils::error::ClassifyError;
use crate::Result;
use base64::Engine;
use image::{GenericImageView, ImageFormat};

/// 默认上传大小限制 (50MB)
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<RasterImage> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        Self::from_bytes(&image_bytes)
    }

    /// 从字节加载图像
    pub fn from_bytes(bytes: &[u8]) -> Result<RasterImage> {
        Self::from_bytes_with_limit(bytes, MAX_IMAGE_BYTES)
    }

    pub fn from_bytes_with_limit(bytes: &[u8], max_bytes: usize) -> Result<RasterImage> {
        if bytes.is_empty() {
            return Err(ClassifyError::Decode("Empty image data".to_string()));
        }

        if bytes.len() > max_bytes {
            return Err(ClassifyError::FileTooLarge(bytes.len(), max_bytes));
        }

        let format = Self::detect_format(bytes).ok_or_else(|| {
            ClassifyError::Decode("Unrecognized image encoding".to_string())
        })?;

        if !Self::is_supported_format(format) {
            return Err(ClassifyError::UnsupportedFormat(format!("{:?}", format)));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;
        let (width, height) = image.dimensions();
        tracing::debug!("Decoded {:?} image: {}x{}", format, width, height);

        RasterImage::from_dynamic(&image)
    }

    /// 从文件路径加载图像
    pub fn from_path(path: &std::path::Path) -> Result<RasterImage> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Gif
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }
}
