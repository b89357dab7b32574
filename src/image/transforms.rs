use crate::image::RasterSurface;
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::Array3;
use serde::Serialize;

/// 归一化坐标下的裁剪窗口，顺序为 [top, left, bottom, right]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropBox {
    pub y1: f32,
    pub x1: f32,
    pub y2: f32,
    pub x2: f32,
}

impl CropBox {
    pub const FULL: CropBox = CropBox {
        y1: 0.0,
        x1: 0.0,
        y2: 1.0,
        x2: 1.0,
    };

    /// 根据宽高比计算正方形裁剪窗口
    ///
    /// 宽图在纵轴上对称裁剪，高图和方图在横轴上对称裁剪。
    /// 注意窗口作用的轴与"裁掉长边"的直觉相反，这是为了与已部署页面的输出保持一致。
    pub fn square(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ClassifyError::InvalidImage(format!(
                "Degenerate image dimensions: {}x{}",
                width, height
            )));
        }

        let width_to_height = width as f32 / height as f32;
        if width_to_height > 1.0 {
            let height_to_width = height as f32 / width as f32;
            let crop_top = (1.0 - height_to_width) / 2.0;
            Ok(CropBox {
                y1: crop_top,
                x1: 0.0,
                y2: 1.0 - crop_top,
                x2: 1.0,
            })
        } else {
            let crop_left = (1.0 - width_to_height) / 2.0;
            Ok(CropBox {
                y1: 0.0,
                x1: crop_left,
                y2: 1.0,
                x2: 1.0 - crop_left,
            })
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.y1, self.x1, self.y2, self.x2]
    }
}

/// 图像变换工具集
pub struct ImageTransforms;

impl ImageTransforms {
    /// 裁剪并双线性缩放到 (out_h, out_w)，输出HWC，取值范围仍为 [0, 255]
    ///
    /// 第 i 个输出采样映射到源坐标 `y1 * (H - 1) + i * (y2 - y1) * (H - 1) / (out_h - 1)`，
    /// 窗口两端正好落在源图像素中心上。
    pub fn crop_and_resize<S: RasterSurface + ?Sized>(
        image: &S,
        crop: &CropBox,
        out_h: usize,
        out_w: usize,
    ) -> Result<Array3<f32>> {
        let (src_h, src_w) = (image.height(), image.width());
        if src_h == 0 || src_w == 0 {
            return Err(ClassifyError::InvalidImage(format!(
                "Degenerate image dimensions: {}x{}",
                src_w, src_h
            )));
        }
        if out_h == 0 || out_w == 0 {
            return Err(ClassifyError::InvalidInput(format!(
                "Invalid output size: {}x{}",
                out_w, out_h
            )));
        }

        let ys = Self::sample_positions(crop.y1, crop.y2, src_h, out_h);
        let xs = Self::sample_positions(crop.x1, crop.x2, src_w, out_w);

        let mut resized = Array3::<f32>::zeros((out_h, out_w, 3));

        for (h, &(top, bottom, y_lerp)) in ys.iter().enumerate() {
            for (w, &(left, right, x_lerp)) in xs.iter().enumerate() {
                let top_left = image.pixel(left, top);
                let top_right = image.pixel(right, top);
                let bottom_left = image.pixel(left, bottom);
                let bottom_right = image.pixel(right, bottom);

                for c in 0..3 {
                    let tl = top_left[c] as f32;
                    let tr = top_right[c] as f32;
                    let bl = bottom_left[c] as f32;
                    let br = bottom_right[c] as f32;

                    let upper = tl + (tr - tl) * x_lerp;
                    let lower = bl + (br - bl) * x_lerp;
                    resized[[h, w, c]] = upper + (lower - upper) * y_lerp;
                }
            }
        }

        Ok(resized)
    }

    /// 每个输出采样的 (低位索引, 高位索引, 插值权重)
    fn sample_positions(start: f32, end: f32, src_len: usize, out_len: usize) -> Vec<(usize, usize, f32)> {
        let max_index = (src_len - 1) as f32;
        let scale = if out_len > 1 {
            (end - start) * max_index / (out_len - 1) as f32
        } else {
            0.0
        };

        (0..out_len)
            .map(|i| {
                let pos = if out_len > 1 {
                    start * max_index + i as f32 * scale
                } else {
                    0.5 * (start + end) * max_index
                };
                // 浮点误差可能让端点略微越界
                let pos = pos.clamp(0.0, max_index);
                let low = pos.floor() as usize;
                let high = (pos.ceil() as usize).min(src_len - 1);
                (low, high, pos - low as f32)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RasterImage;

    fn assert_box(actual: CropBox, expected: [f32; 4]) {
        for (a, e) in actual.to_array().iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_square_image_is_not_cropped() {
        assert_box(CropBox::square(100, 100).unwrap(), [0.0, 0.0, 1.0, 1.0]);
        assert_box(CropBox::square(1, 1).unwrap(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_wide_image_crop_window() {
        assert_box(CropBox::square(200, 100).unwrap(), [0.25, 0.0, 0.75, 1.0]);
    }

    #[test]
    fn test_tall_image_crop_window() {
        assert_box(CropBox::square(100, 200).unwrap(), [0.0, 0.25, 1.0, 0.75]);
    }

    #[test]
    fn test_degenerate_dimensions() {
        assert!(matches!(
            CropBox::square(0, 10),
            Err(ClassifyError::InvalidImage(_))
        ));
        assert!(matches!(
            CropBox::square(10, 0),
            Err(ClassifyError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_identity_resize_keeps_pixels() {
        let pixels: Vec<u8> = (0..4 * 3 * 3).map(|v| v as u8).collect();
        let raster = RasterImage::from_rgb(4, 3, pixels).unwrap();
        let resized = ImageTransforms::crop_and_resize(&raster, &CropBox::FULL, 3, 4).unwrap();

        for y in 0..3 {
            for x in 0..4 {
                let px = raster.pixel(x, y);
                for c in 0..3 {
                    assert_eq!(resized[[y, x, c]], px[c] as f32);
                }
            }
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        // 两个像素之间插值出中点
        let raster = RasterImage::from_rgb(2, 1, vec![0, 0, 0, 200, 100, 50]).unwrap();
        let resized = ImageTransforms::crop_and_resize(&raster, &CropBox::FULL, 1, 3).unwrap();
        assert_eq!(resized[[0, 0, 0]], 0.0);
        assert_eq!(resized[[0, 1, 0]], 100.0);
        assert_eq!(resized[[0, 1, 1]], 50.0);
        assert_eq!(resized[[0, 2, 2]], 50.0);
    }

    #[test]
    fn test_crop_window_selects_center_rows() {
        // 5 行，每行一个灰度值；[0.25, 0.75] 对应第 1 到第 3 行
        let mut pixels = Vec::new();
        for row in 0..5u8 {
            pixels.extend_from_slice(&[row * 10; 3]);
        }
        let raster = RasterImage::from_rgb(1, 5, pixels).unwrap();
        let crop = CropBox {
            y1: 0.25,
            x1: 0.0,
            y2: 0.75,
            x2: 1.0,
        };
        let resized = ImageTransforms::crop_and_resize(&raster, &crop, 3, 1).unwrap();
        assert_eq!(resized[[0, 0, 0]], 10.0);
        assert_eq!(resized[[1, 0, 0]], 20.0);
        assert_eq!(resized[[2, 0, 0]], 30.0);
    }

    #[test]
    fn test_single_pixel_source() {
        let raster = RasterImage::filled(1, 1, [7, 8, 9]).unwrap();
        let resized = ImageTransforms::crop_and_resize(&raster, &CropBox::FULL, 4, 4).unwrap();
        assert_eq!(resized.dim(), (4, 4, 3));
        assert!(resized.iter().all(|&v| v == 7.0 || v == 8.0 || v == 9.0));
    }
}
