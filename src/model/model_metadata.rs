//! モデルメタデータの定義
//!
//! モデルアーカイブ（tar.gz）内の `metadata.json` として保存されます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classifier::CLASS_NAMES;
use crate::preprocess::{ChannelOrder, IMAGE_SIZE};

/// 受け付ける最小の入力サイズ（3段の畳み込みとプーリングを通せる大きさ）
pub const MIN_INPUT_SIZE: u32 = 18;

/// モデルメタデータ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 全クラスラベル（モデル出力のインデックス順）
    /// 例: ["apple", "avocado", ..., "watermelon"]
    pub class_labels: Vec<String>,

    /// モデル入力サイズ（正方形、通常224）
    pub model_input_size: u32,

    /// 入力画素のチャネル順
    #[serde(default)]
    pub channel_order: ChannelOrder,

    /// 作成時刻（ISO8601形式）
    pub created_at: String,

    /// 任意の説明
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self::new(
            CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            IMAGE_SIZE,
            ChannelOrder::default(),
        )
    }
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(class_labels: Vec<String>, model_input_size: u32, channel_order: ChannelOrder) -> Self {
        Self {
            class_labels,
            model_input_size,
            channel_order,
            created_at: chrono::Local::now().to_rfc3339(),
            description: None,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// 期待するクラス数と入力サイズを満たしているか検証
    ///
    /// ラベルは [`CLASS_NAMES`] の並べ替えでなければならない。
    /// 並び順はアーカイブ側が正で、出力ベクトルの位置はこの順に対応する。
    pub fn validate(&self, expected_classes: usize) -> Result<()> {
        if self.class_labels.len() != expected_classes {
            anyhow::bail!(
                "metadata declares {} class labels, expected {}",
                self.class_labels.len(),
                expected_classes
            );
        }
        if let Some(label) = self
            .class_labels
            .iter()
            .find(|l| !CLASS_NAMES.contains(&l.as_str()))
        {
            anyhow::bail!("unknown class label: {:?} (expected one of {})", label, CLASS_NAMES.join(", "));
        }
        for (i, label) in self.class_labels.iter().enumerate() {
            if self.class_labels[..i].contains(label) {
                anyhow::bail!("duplicate class label: {}", label);
            }
        }
        if self.model_input_size < MIN_INPUT_SIZE {
            anyhow::bail!(
                "model input size {} is too small (minimum {})",
                self.model_input_size,
                MIN_INPUT_SIZE
            );
        }
        Ok(())
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metadata_is_valid() {
        let metadata = ModelMetadata::default();
        assert_eq!(metadata.num_classes(), 10);
        assert_eq!(metadata.model_input_size, 224);
        metadata.validate(10).unwrap();
    }

    #[test]
    fn test_wrong_label_count_is_rejected() {
        let mut metadata = ModelMetadata::default();
        metadata.class_labels.pop();
        assert!(metadata.validate(10).is_err());
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let mut metadata = ModelMetadata::default();
        metadata.class_labels[1] = "apple".to_string();
        assert!(metadata.validate(10).is_err());
    }

    #[test]
    fn test_unknown_labels_are_rejected() {
        let mut metadata = ModelMetadata::default();
        metadata.class_labels = (0..10).map(|i| format!("rock{}", i)).collect();
        let err = metadata.validate(10).unwrap_err();
        assert!(err.to_string().contains("rock0"));

        let mut metadata = ModelMetadata::default();
        metadata.class_labels[3] = "Cherry".to_string();
        assert!(metadata.validate(10).is_err());
    }

    #[test]
    fn test_reordered_labels_are_accepted() {
        let mut metadata = ModelMetadata::default();
        metadata.class_labels.reverse();
        metadata.validate(10).unwrap();
        assert_eq!(metadata.class_labels[0], "watermelon");
    }

    #[test]
    fn test_small_input_is_rejected() {
        let mut metadata = ModelMetadata::default();
        metadata.model_input_size = 8;
        assert!(metadata.validate(10).is_err());
    }

    #[test]
    fn test_json_without_channel_order_defaults_to_bgr() {
        let json = r#"{"class_labels":["a","b"],"model_input_size":32,"created_at":"2024-01-01T00:00:00+00:00"}"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert_eq!(metadata.channel_order, ChannelOrder::Bgr);
        assert_eq!(metadata.description, None);
    }
}
