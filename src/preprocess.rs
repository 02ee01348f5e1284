//! 推論前の画像前処理
//!
//! 任意サイズの3チャネル/4チャネル画像を、モデルが期待する
//! (1, size, size, 3) の f32 テンソル（値域 [0, 1]）に変換します。

use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// モデル入力サイズ（正方形）
pub const IMAGE_SIZE: u32 = 224;

/// 前処理済みテンソル (batch=1, height, width, channel)
pub type ImageTensor = Array4<f32>;

/// テンソルに書き出すチャネル順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// 学習済みモデルはBGR順の画素で学習されている
    #[default]
    Bgr,
    Rgb,
}

impl std::fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelOrder::Bgr => write!(f, "BGR"),
            ChannelOrder::Rgb => write!(f, "RGB"),
        }
    }
}

/// 画像前処理
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePreprocessor {
    input_size: u32,
    channel_order: ChannelOrder,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(IMAGE_SIZE, ChannelOrder::default())
    }
}

impl ImagePreprocessor {
    pub fn new(input_size: u32, channel_order: ChannelOrder) -> Self {
        Self {
            input_size,
            channel_order,
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    /// 出力テンソルの形状
    pub fn output_shape(&self) -> [usize; 4] {
        let size = self.input_size as usize;
        [1, size, size, 3]
    }

    /// 画像をモデル入力テンソルに変換
    ///
    /// 1. 4チャネルならアルファを捨てて3チャネルへ
    /// 2. input_size x input_size にバイリニア補間でリサイズ
    /// 3. 255で割って [0, 1] に正規化
    /// 4. 先頭にバッチ次元を追加
    pub fn preprocess(&self, image: &DynamicImage) -> ImageTensor {
        let rgb: RgbImage = match image {
            DynamicImage::ImageRgb8(rgb) => rgb.clone(),
            other => other.to_rgb8(),
        };

        let size = self.input_size;
        let resized = if rgb.dimensions() == (size, size) {
            rgb
        } else {
            // 縮小時はカーネル幅が広がる（アンチエイリアス付き）ため、2x2近傍のみのINTER_LINEARとは画素値が一致しない
            image::imageops::resize(&rgb, size, size, FilterType::Triangle)
        };

        let order = self.channel_order;
        let [_, height, width, channels] = self.output_shape();
        Array4::from_shape_fn((1, height, width, channels), |(_, y, x, c)| {
            let pixel = resized.get_pixel(x as u32, y as u32);
            let channel = match order {
                ChannelOrder::Bgr => 2 - c,
                ChannelOrder::Rgb => c,
            };
            pixel[channel] as f32 / 255.0
        })
    }
}
