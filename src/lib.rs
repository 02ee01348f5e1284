#![recursion_limit = "256"]
//! 果物の写真を分類し、栄養情報テーブルから該当する行を表示する
//!
//! 処理の流れ: 画像読み込み → 前処理 → 分類 → 栄養情報検索

mod error;
pub mod types;
pub mod csv_loader;
pub mod nutrition;
pub mod image_source;
pub mod preprocess;
pub mod classifier;
pub mod pipeline;

// モデル管理・推論
pub mod model;
#[cfg(feature = "ml")]
pub mod ml;

pub use error::{Error, Result};
pub use classifier::{Classifier, ScoreModel, CLASS_NAMES, NUM_CLASSES};
pub use csv_loader::{load_nutrition_table, read_nutrition_table, NutritionTable};
pub use image_source::{decode_data_url, decode_image, load_image};
pub use nutrition::{normalize_label, MatchPolicy, NutritionResolver};
pub use pipeline::FruitPipeline;
pub use preprocess::{ChannelOrder, ImagePreprocessor, ImageTensor, IMAGE_SIZE};
pub use types::{NutrientFacts, NutrientLine, NutritionRow, Prediction, PredictionReport};
