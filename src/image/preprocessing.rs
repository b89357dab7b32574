use crate::config::TensorLayout;
use crate::image::{CropBox, ImageTransforms, RasterSurface};
use crate::Result;
use ndarray::{Array4, Axis};

/// 模型输入边长
pub const INPUT_SIZE: usize = 224;

/// 归一化后的模型输入，形状 (1, H, W, 3)，取值 [0, 1]
#[derive(Debug, Clone)]
pub struct InputTensor {
    data: Array4<f32>,
    crop: CropBox,
}

impl InputTensor {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn crop(&self) -> CropBox {
        self.crop
    }

    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }

    /// 按模型要求的布局输出，NCHW 时做一次转置拷贝
    pub fn into_layout(self, layout: TensorLayout) -> Array4<f32> {
        match layout {
            TensorLayout::Nhwc => self.data,
            TensorLayout::Nchw => self.data.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned(),
        }
    }
}

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 分类预处理流水线：正方形裁剪窗口 -> 双线性缩放 -> 除以255
    pub fn preprocess<S: RasterSurface + ?Sized>(image: &S) -> Result<InputTensor> {
        Self::preprocess_with_size(image, INPUT_SIZE)
    }

    pub fn preprocess_with_size<S: RasterSurface + ?Sized>(
        image: &S,
        size: usize,
    ) -> Result<InputTensor> {
        let crop = CropBox::square(image.width(), image.height())?;
        tracing::debug!(
            "Preprocessing {}x{} image with crop window {:?}",
            image.width(),
            image.height(),
            crop.to_array()
        );

        let mut resized = ImageTransforms::crop_and_resize(image, &crop, size, size)?;
        resized.mapv_inplace(|v| v / 255.0);

        // 添加batch维度
        let data = resized.insert_axis(Axis(0));

        Ok(InputTensor { data, crop })
    }
}
