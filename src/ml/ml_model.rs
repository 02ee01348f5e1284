//! 果物分類用CNNモデルの定義

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

/// 全結合層に渡す前の特徴マップサイズ
const POOLED_SIZE: usize = 4;

/// 最終畳み込み層のチャネル数
const FEATURE_CHANNELS: usize = 128;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// 入力画像サイズ（正方形）
    #[config(default = 224)]
    pub image_size: usize,
    /// 全結合層の中間次元
    #[config(default = 256)]
    pub hidden_size: usize,
}

impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> FruitNet<B> {
        // Conv (3x3, no padding): size -> size - 2
        // Pool (2x2): size -> size / 2
        let after_conv1 = self.image_size.saturating_sub(2);
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.saturating_sub(2);
        let after_pool2 = after_conv2 / 2;
        let feature_map_size = after_pool2.saturating_sub(2);

        let d = FEATURE_CHANNELS * POOLED_SIZE * POOLED_SIZE;

        tracing::debug!(
            "[Model] 入力 {0}x{0} -> Conv3後 {1}x{1} -> AdaptivePool {2}x{2} -> FC {3} -> {4} -> {5}",
            self.image_size,
            feature_map_size,
            POOLED_SIZE,
            d,
            self.hidden_size,
            self.num_classes
        );

        FruitNet {
            conv1: Conv2dConfig::new([3, 32], [3, 3]).with_stride([1, 1]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).with_stride([1, 1]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(),
            conv3: Conv2dConfig::new([64, FEATURE_CHANNELS], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool3: AdaptiveAvgPool2dConfig::new([POOLED_SIZE, POOLED_SIZE]).init(),
            fc1: LinearConfig::new(d, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// 果物分類用CNNモデル
///
/// # アーキテクチャ
/// - {Conv 3x3 + ReLU + MaxPool 2x2} x 2層
/// - Conv 3x3 + ReLU
/// - AdaptiveAvgPool -> 128 x 4 x 4
/// - FC: 2048 -> hidden + ReLU
/// - FC: hidden -> num_classes
///
/// 入力はNHWC（前処理の出力そのまま）で受け取り、内部でNCHWに並べ替えます。
#[derive(Module, Debug)]
pub struct FruitNet<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 32
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 32 -> 64
    pool2: MaxPool2d,
    conv3: Conv2d<B>, // 64 -> 128
    pool3: AdaptiveAvgPool2d,

    fc1: Linear<B>,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> FruitNet<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, height, width, 3]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        // NHWC -> NCWH -> NCHW
        let x = images.swap_dims(1, 3).swap_dims(2, 3);

        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool3.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// クラスごとの確率 [batch_size, num_classes]
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}
