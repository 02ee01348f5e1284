//! アプリケーション設定管理モジュール
//!
//! 計算デバイス・モデル・栄養データなどの設定をJSON形式で保存・読み込みします。

use crate::classifier::NUM_CLASSES;
use crate::nutrition::MatchPolicy;
use crate::preprocess::{ChannelOrder, IMAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    #[default]
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// モデルアーカイブ（tar.gz）のパス
    pub model_path: String,
    /// 分類クラス数
    pub num_classes: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/fruit_classifier.tar.gz".to_string(),
            num_classes: NUM_CLASSES,
        }
    }
}

/// 栄養データ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionSettings {
    /// 栄養データCSVのパス
    pub csv_path: String,
    /// 果物名の照合方法
    #[serde(default)]
    pub match_policy: MatchPolicy,
    /// ラベル → テーブル上の果物名
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl Default for NutritionSettings {
    fn default() -> Self {
        Self {
            csv_path: "fruitsnutrition.csv".to_string(),
            match_policy: MatchPolicy::default(),
            aliases: HashMap::new(),
        }
    }
}

/// 前処理設定（モデルが読み込めた場合はモデルのメタデータが優先される）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSettings {
    pub input_size: u32,
    pub channel_order: ChannelOrder,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            input_size: IMAGE_SIZE,
            channel_order: ChannelOrder::default(),
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// 栄養データ設定
    #[serde(default)]
    pub nutrition: NutritionSettings,
    /// 前処理設定
    #[serde(default)]
    pub preprocess: PreprocessSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 設定を読み込む。存在しない・読めない場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    tracing::info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定情報を表示
    pub fn display(&self) {
        println!("=== アプリケーション設定 ===");
        println!("計算デバイス: {}", self.device_type);
        println!("モデルパス: {}", self.model.model_path);
        println!("分類クラス数: {}", self.model.num_classes);
        println!("栄養データ: {}", self.nutrition.csv_path);
        println!("照合方法: {}", self.nutrition.match_policy);
        println!("別名: {}件", self.nutrition.aliases.len());
        println!(
            "入力サイズ: {}x{} ({})",
            self.preprocess.input_size, self.preprocess.input_size, self.preprocess.channel_order
        );
        println!("========================\n");
    }
}
