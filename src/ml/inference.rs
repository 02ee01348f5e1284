//! モデル推論機能

use anyhow::Result;
use std::path::{Path, PathBuf};

use burn::{
    backend::{wgpu::WgpuDevice, Wgpu},
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor},
};
use burn_ndarray::{NdArray, NdArrayDevice};

use crate::classifier::ScoreModel;
use crate::error::Error;
use crate::ml::{FruitNet, ModelConfig};
use crate::model::{load_model_with_metadata, save_model_with_metadata, DeviceType, InferenceConfig, ModelMetadata};
use crate::preprocess::{ChannelOrder, ImageTensor};

/// 計算デバイスごとのモデル
enum Backbone {
    Wgpu {
        model: FruitNet<Wgpu>,
        device: WgpuDevice,
    },
    Cpu {
        model: FruitNet<NdArray<f32>>,
        device: NdArrayDevice,
    },
}

/// 推論エンジン
pub struct InferenceEngine {
    backbone: Backbone,
    metadata: ModelMetadata,
    config: InferenceConfig,
}

impl InferenceEngine {
    /// モデルアーカイブを読み込んで推論エンジンを初期化
    pub fn load(model_path: &Path, device_type: DeviceType, expected_classes: usize) -> Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path)?;
        metadata.validate(expected_classes)?;
        Self::build(metadata, Some(model_binary), device_type)
    }

    /// 学習前の（ランダム初期化された）モデルを作成
    pub fn init_untrained(metadata: ModelMetadata, device_type: DeviceType) -> Result<Self> {
        metadata.validate(metadata.num_classes())?;
        Self::build(metadata, None, device_type)
    }

    fn build(metadata: ModelMetadata, model_binary: Option<Vec<u8>>, device_type: DeviceType) -> Result<Self> {
        let backbone = match device_type {
            DeviceType::Wgpu => {
                let device = WgpuDevice::default();
                let model = init_model::<Wgpu>(&metadata, model_binary, &device)?;
                Backbone::Wgpu { model, device }
            }
            DeviceType::Cpu => {
                let device = NdArrayDevice::Cpu;
                let model = init_model::<NdArray<f32>>(&metadata, model_binary, &device)?;
                Backbone::Cpu { model, device }
            }
        };

        tracing::info!(
            "推論エンジンを初期化しました: {} ({}クラス, 入力{}x{})",
            device_type,
            metadata.num_classes(),
            metadata.model_input_size,
            metadata.model_input_size
        );

        let config = InferenceConfig::from_metadata(&metadata);
        Ok(Self {
            backbone,
            metadata,
            config,
        })
    }

    /// モデルの重みをバイト列に変換
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let bytes = match &self.backbone {
            Backbone::Wgpu { model, .. } => recorder.record(model.clone().into_record(), ()),
            Backbone::Cpu { model, .. } => recorder.record(model.clone().into_record(), ()),
        };
        bytes.map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))
    }

    /// メタデータと重みをアーカイブとして保存
    pub fn save(&self, output_path: &Path) -> Result<PathBuf> {
        let model_binary = self.to_bytes()?;
        save_model_with_metadata(output_path, &self.metadata, &model_binary)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

impl ScoreModel for InferenceEngine {
    fn labels(&self) -> &[String] {
        &self.config.class_labels
    }

    fn input_size(&self) -> u32 {
        self.config.model_input_size
    }

    fn channel_order(&self) -> ChannelOrder {
        self.config.channel_order
    }

    fn scores(&self, input: &ImageTensor) -> crate::Result<Vec<f32>> {
        let (n, h, w, c) = input.dim();
        let expected = self.config.input_shape();
        if [n, h, w, c] != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: [n, h, w, c],
            });
        }

        match &self.backbone {
            Backbone::Wgpu { model, device } => forward_scores(model, device, input),
            Backbone::Cpu { model, device } => forward_scores(model, device, input),
        }
    }
}

fn init_model<B: Backend>(
    metadata: &ModelMetadata,
    model_binary: Option<Vec<u8>>,
    device: &B::Device,
) -> Result<FruitNet<B>> {
    let model = ModelConfig::new(metadata.num_classes())
        .with_image_size(metadata.model_input_size as usize)
        .init::<B>(device);

    match model_binary {
        Some(binary) => {
            let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
            let record = recorder
                .load(binary, device)
                .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
            Ok(model.load_record(record))
        }
        None => Ok(model),
    }
}

fn forward_scores<B: Backend>(
    model: &FruitNet<B>,
    device: &B::Device,
    input: &ImageTensor,
) -> crate::Result<Vec<f32>> {
    let (n, h, w, c) = input.dim();
    let data: Vec<f32> = input.iter().copied().collect();

    let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([n, h, w, c]);
    let probabilities = model.probabilities(tensor);

    probabilities
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::Inference(format!("推論結果の取得エラー: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, CLASS_NAMES, NUM_CLASSES};
    use crate::preprocess::ImagePreprocessor;
    use image::{DynamicImage, Rgb, RgbImage};

    fn small_metadata() -> ModelMetadata {
        let mut metadata = ModelMetadata::default();
        metadata.model_input_size = 32;
        metadata
    }

    fn sample_input() -> ImageTensor {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(40, 30, |x, y| {
            Rgb([(x * 6) as u8, (y * 8) as u8, 90])
        }));
        ImagePreprocessor::new(32, ChannelOrder::Bgr).preprocess(&img)
    }

    #[test]
    fn test_scores_are_probabilities() {
        let engine = InferenceEngine::init_untrained(small_metadata(), DeviceType::Cpu).unwrap();
        let scores = engine.scores(&sample_input()).unwrap();

        assert_eq!(scores.len(), NUM_CLASSES);
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_save_load_predict() {
        let dir = tempfile::tempdir().unwrap();
        let engine = InferenceEngine::init_untrained(small_metadata(), DeviceType::Cpu).unwrap();
        let input = sample_input();
        let before = engine.scores(&input).unwrap();

        let path = engine.save(&dir.path().join("fruit")).unwrap();
        let loaded = InferenceEngine::load(&path, DeviceType::Cpu, NUM_CLASSES).unwrap();
        let after = loaded.scores(&input).unwrap();

        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-5);
        }

        let prediction = Classifier::new(Box::new(loaded)).predict(&input).unwrap();
        assert!(CLASS_NAMES.contains(&prediction.label.as_str()));
    }

    #[test]
    fn test_load_rejects_wrong_class_count() {
        let dir = tempfile::tempdir().unwrap();
        let engine = InferenceEngine::init_untrained(small_metadata(), DeviceType::Cpu).unwrap();
        let path = engine.save(&dir.path().join("fruit.tar.gz")).unwrap();

        assert!(InferenceEngine::load(&path, DeviceType::Cpu, 5).is_err());
    }

    #[test]
    fn test_archive_with_unknown_labels_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = InferenceEngine::init_untrained(small_metadata(), DeviceType::Cpu).unwrap();
        let mut metadata = small_metadata();
        metadata.class_labels = (0..10).map(|i| format!("rock{}", i)).collect();
        let path = save_model_with_metadata(&dir.path().join("rocks"), &metadata, &engine.to_bytes().unwrap()).unwrap();

        assert!(InferenceEngine::load(&path, DeviceType::Cpu, NUM_CLASSES).is_err());
        let classifier = Classifier::load_or_log(&path, NUM_CLASSES, DeviceType::Cpu);
        assert!(!classifier.is_available());
        assert!(matches!(classifier.predict(&sample_input()), Err(Error::ModelUnavailable(_))));
    }

    #[test]
    fn test_reordered_archive_predicts_in_archive_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = small_metadata();
        metadata.class_labels.reverse();
        let path = InferenceEngine::init_untrained(metadata, DeviceType::Cpu)
            .unwrap()
            .save(&dir.path().join("reversed"))
            .unwrap();

        let classifier = Classifier::load_or_log(&path, NUM_CLASSES, DeviceType::Cpu);
        let prediction = classifier.predict(&sample_input()).unwrap();
        assert_eq!(prediction.label, CLASS_NAMES[NUM_CLASSES - 1 - prediction.index]);
    }

    #[test]
    fn test_gpu_load_never_panics() {
        let dir = tempfile::tempdir().unwrap();
        let path = InferenceEngine::init_untrained(small_metadata(), DeviceType::Cpu)
            .unwrap()
            .save(&dir.path().join("fruit"))
            .unwrap();

        // Without an adapter the classifier is unavailable; with one it predicts.
        let classifier = Classifier::load_or_log(&path, NUM_CLASSES, DeviceType::Wgpu);
        match classifier.predict(&sample_input()) {
            Ok(prediction) => assert!(CLASS_NAMES.contains(&prediction.label.as_str())),
            Err(e) => {
                assert!(!classifier.is_available());
                assert!(matches!(e, Error::ModelUnavailable(_)));
            }
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let engine = InferenceEngine::init_untrained(small_metadata(), DeviceType::Cpu).unwrap();
        let wrong = ImagePreprocessor::new(48, ChannelOrder::Bgr)
            .preprocess(&DynamicImage::ImageRgb8(RgbImage::new(10, 10)));

        assert!(matches!(
            engine.scores(&wrong),
            Err(Error::ShapeMismatch { expected: [1, 32, 32, 3], actual: [1, 48, 48, 3] })
        ));
    }
}
