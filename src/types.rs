use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 果物名のカラム
pub const FRUIT_COLUMN: &str = "fruit";

/// 表示する栄養素: (表示名, CSVカラム名, 単位)
pub const NUTRIENT_COLUMNS: [(&str, &str, &str); 9] = [
    ("Energy", "energy (kcal/kJ)", "kcal"),
    ("Protein", "protein (g)", "g"),
    ("Total Fat", "total fat (g)", "g"),
    ("Carbohydrates", "carbohydrates (g)", "g"),
    ("Calcium", "calcium (mg)", "mg"),
    ("Iron", "iron (mg)", "mg"),
    ("Vit A", "vitamin A (IU)", "IU"),
    ("Vit C", "vitamin C (mg)", "mg"),
    ("Vit E", "vitamin E (mg)", "mg"),
];

/// 栄養テーブルの1行
///
/// ヘッダー名（前後の空白は除去済み）からセルの文字列への対応を保持します。
/// スキーマ検証は行わず、存在しないカラムはアクセス時にエラーになります。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRow {
    pub fields: HashMap<String, String>,
}

impl NutritionRow {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    /// カラムの値を取得
    pub fn field(&self, column: &str) -> Result<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingColumn(column.to_string()))
    }

    /// 果物名（カラムが無い・空の場合は None）
    pub fn fruit(&self) -> Option<&str> {
        self.fields
            .get(FRUIT_COLUMN)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }
}

/// 表示用の栄養素1行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientLine {
    pub nutrient: String,
    pub amount: String,
}

/// 表示用の栄養情報テーブル
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientFacts {
    pub fruit: String,
    pub lines: Vec<NutrientLine>,
}

impl NutrientFacts {
    /// 行から表示テーブルを組み立てる。値には単位を付加する
    pub fn from_row(row: &NutritionRow) -> Result<Self> {
        let lines = NUTRIENT_COLUMNS
            .iter()
            .map(|(label, column, unit)| {
                Ok(NutrientLine {
                    nutrient: label.to_string(),
                    amount: format!("{} {}", row.field(column)?, unit),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            fruit: row.field(FRUIT_COLUMN)?.to_string(),
            lines,
        })
    }
}

impl std::fmt::Display for NutrientFacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .lines
            .iter()
            .map(|l| l.nutrient.len())
            .max()
            .unwrap_or(0)
            .max("Nutrient".len());

        writeln!(f, "{:<width$}  Amount", "Nutrient", width = width)?;
        for line in &self.lines {
            writeln!(f, "{:<width$}  {}", line.nutrient, line.amount, width = width)?;
        }
        Ok(())
    }
}

/// 分類結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// 予測ラベル（小文字のクラス名）
    pub label: String,
    /// ラベルのインデックス
    pub index: usize,
    /// クラスごとのスコア
    pub scores: Vec<f32>,
}

impl Prediction {
    pub fn score(&self) -> f32 {
        self.scores.get(self.index).copied().unwrap_or(0.0)
    }
}

/// パイプラインの出力
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub prediction: Prediction,
    /// 表示名（先頭を大文字にしたラベル）
    pub display_name: String,
    /// 栄養情報（テーブルに無い場合は None）
    pub nutrition: Option<NutrientFacts>,
}
