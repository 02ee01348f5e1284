//! モデルメタデータから推論に必要な情報を取り出す

use crate::model::model_metadata::ModelMetadata;
use crate::preprocess::ChannelOrder;

/// モデルメタデータから推論用情報を取得
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// 全クラスラベル（モデル出力のインデックス順）
    pub class_labels: Vec<String>,

    /// モデル入力解像度
    pub model_input_size: u32,

    /// 入力画素のチャネル順
    pub channel_order: ChannelOrder,
}

impl InferenceConfig {
    /// メタデータからInferenceConfigを作成
    pub fn from_metadata(metadata: &ModelMetadata) -> Self {
        Self {
            class_labels: metadata.class_labels.clone(),
            model_input_size: metadata.model_input_size,
            channel_order: metadata.channel_order,
        }
    }

    /// モデル入力テンソルの形状 (1, size, size, 3)
    pub fn input_shape(&self) -> [usize; 4] {
        let size = self.model_input_size as usize;
        [1, size, size, 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_follows_metadata() {
        let mut metadata = ModelMetadata::default();
        metadata.model_input_size = 64;
        metadata.channel_order = ChannelOrder::Rgb;
        let config = InferenceConfig::from_metadata(&metadata);

        assert_eq!(config.input_shape(), [1, 64, 64, 3]);
        assert_eq!(config.channel_order, ChannelOrder::Rgb);
        assert_eq!(config.class_labels[5], "mango");
    }
}
