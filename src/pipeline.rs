//! 前処理 → 分類 → 栄養情報検索 のパイプライン

use anyhow::Context;
use image::DynamicImage;
use std::path::Path;

use crate::classifier::Classifier;
use crate::csv_loader::{load_nutrition_table, NutritionTable};
use crate::error::Result;
use crate::model::AppConfig;
use crate::nutrition::{normalize_label, NutritionResolver};
use crate::preprocess::ImagePreprocessor;
use crate::types::{NutrientFacts, NutritionRow, PredictionReport};

/// 起動時に一度だけ構築し、プロセス終了まで保持する
#[derive(Debug)]
pub struct FruitPipeline {
    classifier: Classifier,
    table: NutritionTable,
    resolver: NutritionResolver,
    preprocessor: ImagePreprocessor,
}

impl FruitPipeline {
    pub fn new(
        classifier: Classifier,
        table: NutritionTable,
        resolver: NutritionResolver,
        preprocessor: ImagePreprocessor,
    ) -> Self {
        let pipeline = Self {
            classifier,
            table,
            resolver,
            preprocessor,
        };
        pipeline.warn_unmatched_labels();
        pipeline
    }

    /// 設定からパイプラインを構築
    ///
    /// 栄養テーブルの読み込み失敗はエラーとして返す。
    /// モデルの読み込み失敗はログに記録するだけで、推論時にエラーになる。
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let table = load_nutrition_table(Path::new(&config.nutrition.csv_path))
            .with_context(|| format!("Failed to load nutrition table: {}", config.nutrition.csv_path))?;

        let resolver = NutritionResolver::new(config.nutrition.match_policy)
            .with_aliases(config.nutrition.aliases.clone());

        let classifier = Classifier::load_or_log(
            Path::new(&config.model.model_path),
            config.model.num_classes,
            config.device_type,
        );

        // モデルが読めた場合はモデルの入力仕様に合わせる
        let preprocessor = match classifier.model() {
            Ok(model) => ImagePreprocessor::new(model.input_size(), model.channel_order()),
            Err(_) => ImagePreprocessor::new(
                config.preprocess.input_size,
                config.preprocess.channel_order,
            ),
        };

        Ok(Self::new(classifier, table, resolver, preprocessor))
    }

    fn warn_unmatched_labels(&self) {
        let Ok(model) = self.classifier.model() else {
            return;
        };
        for label in self.resolver.unmatched_labels(&self.table, model.labels()) {
            tracing::warn!("ラベル '{}' に対応する栄養情報がテーブルにありません", label);
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn table(&self) -> &NutritionTable {
        &self.table
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// 予測ラベルの栄養テーブル行を検索
    pub fn lookup(&self, label: &str) -> Option<&NutritionRow> {
        self.resolver.resolve(&self.table, label)
    }

    /// 予測ラベルの表示用栄養情報を取得（見つからなければ None）
    pub fn nutrition_facts(&self, label: &str) -> Result<Option<NutrientFacts>> {
        self.lookup(label).map(NutrientFacts::from_row).transpose()
    }

    /// 画像を分類し、栄養情報を添えて返す
    pub fn predict(&self, image: &DynamicImage) -> Result<PredictionReport> {
        let tensor = self.preprocessor.preprocess(image);
        let prediction = self.classifier.predict(&tensor)?;

        let display_name = normalize_label(&prediction.label);
        let nutrition = self.nutrition_facts(&display_name)?;
        if nutrition.is_none() {
            tracing::info!("'{}' の栄養情報はありません", display_name);
        }

        Ok(PredictionReport {
            prediction,
            display_name,
            nutrition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::FixedScores;
    use crate::classifier::NUM_CLASSES;
    use crate::csv_loader::read_nutrition_table;
    use crate::error::Error;
    use image::{Rgb, RgbImage};

    const CSV: &str = "fruit,energy (kcal/kJ),protein (g),total fat (g),carbohydrates (g),calcium (mg),iron (mg),vitamin A (IU),vitamin C (mg),vitamin E (mg)\n\
Apple,52 kcal/220 kJ,0.3,0.2,14,6,0.1,54,4.6,0.18\n\
Banana,89 kcal/371 kJ,1.1,0.3,23,5,0.3,64,8.7,0.1\n";

    fn pipeline_with_scores(hot: usize) -> FruitPipeline {
        let mut scores = vec![0.01; NUM_CLASSES];
        scores[hot] = 0.9;
        FruitPipeline::new(
            Classifier::new(Box::new(FixedScores::new(scores))),
            read_nutrition_table(CSV.as_bytes()).unwrap(),
            NutritionResolver::default(),
            ImagePreprocessor::default(),
        )
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([200, 20, 20])))
    }

    #[test]
    fn test_predict_with_nutrition() {
        let report = pipeline_with_scores(0).predict(&image()).unwrap();
        assert_eq!(report.prediction.label, "apple");
        assert_eq!(report.display_name, "Apple");

        let facts = report.nutrition.unwrap();
        assert_eq!(facts.fruit, "Apple");
        assert_eq!(facts.lines[0].amount, "52 kcal/220 kJ kcal");
    }

    #[test]
    fn test_predict_without_nutrition() {
        // mango はテーブルに無い
        let report = pipeline_with_scores(5).predict(&image()).unwrap();
        assert_eq!(report.display_name, "Mango");
        assert!(report.nutrition.is_none());
    }

    #[test]
    fn test_lookup() {
        let pipeline = pipeline_with_scores(0);
        assert_eq!(pipeline.lookup("apple").unwrap().field("energy (kcal/kJ)").unwrap(), "52 kcal/220 kJ");
        assert!(pipeline.lookup("Durian").is_none());
    }

    #[test]
    fn test_unavailable_model_fails_on_predict() {
        let pipeline = FruitPipeline::new(
            Classifier::unavailable("no model"),
            read_nutrition_table(CSV.as_bytes()).unwrap(),
            NutritionResolver::default(),
            ImagePreprocessor::default(),
        );

        // 栄養情報の検索はモデル無しでも動く
        assert!(pipeline.lookup("banana").is_some());
        assert!(matches!(
            pipeline.predict(&image()),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_from_config_tolerates_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("fruitsnutrition.csv");
        std::fs::write(&csv_path, CSV).unwrap();

        let mut config = AppConfig::default();
        config.nutrition.csv_path = csv_path.to_string_lossy().to_string();
        config.model.model_path = dir.path().join("missing.tar.gz").to_string_lossy().to_string();

        let pipeline = FruitPipeline::from_config(&config).unwrap();
        assert!(!pipeline.classifier().is_available());
        assert_eq!(pipeline.preprocessor().input_size(), 224);
        assert_eq!(pipeline.table().len(), 2);
    }

    #[test]
    fn test_from_config_requires_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.nutrition.csv_path = dir.path().join("none.csv").to_string_lossy().to_string();

        assert!(FruitPipeline::from_config(&config).is_err());
    }
}
