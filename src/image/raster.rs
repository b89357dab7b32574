use crate::utils::error::ClassifyError;
use crate::Result;
use image::DynamicImage;

/// 可按像素寻址的RGB光栅表面
pub trait RasterSurface {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// 读取 (x, y) 处的RGB像素，调用方保证坐标在范围内
    fn pixel(&self, x: usize, y: usize) -> [u8; 3];
}

/// 解码后的RGB图像，创建后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// 从交错的RGB字节构造
    pub fn from_rgb(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ClassifyError::InvalidImage(format!(
                "Degenerate image dimensions: {}x{}",
                width, height
            )));
        }

        let expected = width * height * 3;
        if pixels.len() != expected {
            return Err(ClassifyError::InvalidImage(format!(
                "Pixel buffer has {} bytes, expected {} for {}x{} RGB",
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 纯色图像，测试和健康检查时使用
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Result<Self> {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width * height * 3)
            .collect();
        Self::from_rgb(width, height, pixels)
    }

    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        let rgb_image = image.to_rgb8();
        let (width, height) = rgb_image.dimensions();
        Self::from_rgb(width as usize, height as usize, rgb_image.into_raw())
    }
}

impl RasterSurface for RasterImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * self.width + x) * 3;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_addressing() {
        let pixels = vec![
            1, 2, 3, 4, 5, 6, //
            7, 8, 9, 10, 11, 12,
        ];
        let raster = RasterImage::from_rgb(2, 2, pixels).unwrap();
        assert_eq!(raster.pixel(0, 0), [1, 2, 3]);
        assert_eq!(raster.pixel(1, 0), [4, 5, 6]);
        assert_eq!(raster.pixel(0, 1), [7, 8, 9]);
        assert_eq!(raster.pixel(1, 1), [10, 11, 12]);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            RasterImage::from_rgb(0, 4, Vec::new()),
            Err(ClassifyError::InvalidImage(_))
        ));
        assert!(matches!(
            RasterImage::from_rgb(4, 0, Vec::new()),
            Err(ClassifyError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_buffer_length_checked() {
        assert!(RasterImage::from_rgb(2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn test_from_dynamic_drops_alpha() {
        let rgba = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 40]));
        let raster = RasterImage::from_dynamic(&DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!((raster.width(), raster.height()), (3, 2));
        assert_eq!(raster.pixel(2, 1), [10, 20, 30]);
    }
}
