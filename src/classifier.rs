//! 果物分類器
//!
//! 学習済みモデル（[`ScoreModel`]）の出力スコアをラベルに変換します。
//! モデルの読み込みは起動時に一度だけ行い、失敗してもプロセスは継続します。
//! その場合は最初の推論時に [`Error::ModelUnavailable`] になります。

use crate::error::{Error, Result};
use crate::model::DeviceType;
use crate::preprocess::{ChannelOrder, ImageTensor};
use crate::types::Prediction;
use std::path::Path;

/// クラス数
pub const NUM_CLASSES: usize = 10;

/// クラス名の定義（モデル出力のインデックス順）
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "apple",
    "avocado",
    "banana",
    "cherry",
    "kiwi",
    "mango",
    "orange",
    "pineapple",
    "strawberry",
    "watermelon",
];

/// 前処理済み画像からクラスごとのスコアを返すモデル
pub trait ScoreModel {
    /// 出力ベクトルと位置で対応するラベル
    fn labels(&self) -> &[String];

    /// モデル入力サイズ（正方形）
    fn input_size(&self) -> u32;

    /// 学習時のチャネル順
    fn channel_order(&self) -> ChannelOrder;

    /// (1, size, size, 3) のテンソルからラベル数と同じ長さのスコアを返す
    fn scores(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

/// 最大スコアのインデックス（同値の場合は先頭を優先）
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 読み込み済みのモデル、または読み込みに失敗した理由を保持する
pub struct Classifier {
    model: std::result::Result<Box<dyn ScoreModel>, String>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.model {
            Ok(model) => f
                .debug_struct("Classifier")
                .field("labels", &model.labels())
                .field("input_size", &model.input_size())
                .finish(),
            Err(reason) => f.debug_struct("Classifier").field("unavailable", reason).finish(),
        }
    }
}

impl Classifier {
    pub fn new(model: Box<dyn ScoreModel>) -> Self {
        Self { model: Ok(model) }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            model: Err(reason.into()),
        }
    }

    /// モデルアーカイブを読み込む。失敗はログに記録し、利用不可の分類器を返す
    ///
    /// バックエンド初期化時のパニック（GPUアダプタが無い場合など）も失敗として扱う
    pub fn load_or_log(model_path: &Path, num_classes: usize, device: DeviceType) -> Self {
        Self::from_loader(model_path, || Self::try_load(model_path, num_classes, device))
    }

    fn from_loader<F>(model_path: &Path, loader: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Box<dyn ScoreModel>>,
    {
        let loaded = std::panic::catch_unwind(std::panic::AssertUnwindSafe(loader)).unwrap_or_else(|payload| {
            Err(anyhow::anyhow!(
                "バックエンドの初期化中にパニックしました: {}",
                panic_message(payload.as_ref())
            ))
        });

        match loaded {
            Ok(model) => {
                tracing::info!("モデルを読み込みました: {}", model_path.display());
                Self::new(model)
            }
            Err(e) => {
                tracing::error!("モデルの読み込みに失敗しました ({}): {:#}", model_path.display(), e);
                Self::unavailable(format!("{}: {:#}", model_path.display(), e))
            }
        }
    }

    #[cfg(feature = "ml")]
    fn try_load(model_path: &Path, num_classes: usize, device: DeviceType) -> anyhow::Result<Box<dyn ScoreModel>> {
        let engine = crate::ml::InferenceEngine::load(model_path, device, num_classes)?;
        Ok(Box::new(engine))
    }

    #[cfg(not(feature = "ml"))]
    fn try_load(_model_path: &Path, _num_classes: usize, _device: DeviceType) -> anyhow::Result<Box<dyn ScoreModel>> {
        anyhow::bail!("built without the `ml` feature")
    }

    pub fn is_available(&self) -> bool {
        self.model.is_ok()
    }

    /// 読み込み済みモデルを取得
    pub fn model(&self) -> Result<&dyn ScoreModel> {
        match &self.model {
            Ok(model) => Ok(model.as_ref()),
            Err(reason) => Err(Error::ModelUnavailable(reason.clone())),
        }
    }

    /// 前処理済み画像を分類
    pub fn predict(&self, input: &ImageTensor) -> Result<Prediction> {
        let model = self.model()?;
        let labels = model.labels();

        let scores = model.scores(input)?;
        if scores.len() != labels.len() {
            return Err(Error::ScoreLength {
                expected: labels.len(),
                actual: scores.len(),
            });
        }

        let index = argmax(&scores).ok_or(Error::ScoreLength {
            expected: labels.len(),
            actual: 0,
        })?;

        let prediction = Prediction {
            label: labels[index].clone(),
            index,
            scores,
        };
        tracing::debug!(
            "予測: {} (index={}, score={:.4})",
            prediction.label,
            prediction.index,
            prediction.score()
        );
        Ok(prediction)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::Array4;

    /// 固定スコアを返すテスト用モデル
    pub(crate) struct FixedScores {
        pub labels: Vec<String>,
        pub scores: Vec<f32>,
    }

    impl FixedScores {
        pub(crate) fn new(scores: Vec<f32>) -> Self {
            Self {
                labels: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
                scores,
            }
        }
    }

    impl ScoreModel for FixedScores {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn input_size(&self) -> u32 {
            224
        }

        fn channel_order(&self) -> ChannelOrder {
            ChannelOrder::Bgr
        }

        fn scores(&self, _input: &ImageTensor) -> Result<Vec<f32>> {
            Ok(self.scores.clone())
        }
    }

    fn input() -> ImageTensor {
        Array4::zeros((1, 224, 224, 3))
    }

    #[test]
    fn test_argmax_first_max_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_predict_maps_index_to_label() {
        let mut scores = vec![0.0; NUM_CLASSES];
        scores[7] = 0.9;
        let classifier = Classifier::new(Box::new(FixedScores::new(scores)));

        let prediction = classifier.predict(&input()).unwrap();
        assert_eq!(prediction.label, "pineapple");
        assert_eq!(prediction.index, 7);
        assert!(CLASS_NAMES.contains(&prediction.label.as_str()));
    }

    #[test]
    fn test_wrong_score_length_is_error() {
        let classifier = Classifier::new(Box::new(FixedScores::new(vec![1.0, 2.0])));
        assert!(matches!(
            classifier.predict(&input()),
            Err(Error::ScoreLength { expected: 10, actual: 2 })
        ));
    }

    #[test]
    fn test_missing_model_fails_at_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = Classifier::load_or_log(&dir.path().join("missing.tar.gz"), NUM_CLASSES, DeviceType::Cpu);

        assert!(!classifier.is_available());
        assert!(matches!(
            classifier.predict(&input()),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_backend_panic_is_not_fatal() {
        let classifier = Classifier::from_loader(Path::new("models/fruit.tar.gz"), || {
            panic!("No possible adapter available for backend")
        });

        assert!(!classifier.is_available());
        match classifier.predict(&input()) {
            Err(Error::ModelUnavailable(reason)) => assert!(reason.contains("No possible adapter")),
            other => panic!("unexpected result: {:?}", other.map(|p| p.label)),
        }
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned = std::panic::catch_unwind(|| panic!("{} adapters", 0)).unwrap_err();
        assert_eq!(panic_message(owned.as_ref()), "0 adapters");

        let fixed = std::panic::catch_unwind(|| panic!("no device")).unwrap_err();
        assert_eq!(panic_message(fixed.as_ref()), "no device");
    }
}
