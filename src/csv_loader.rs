//! 栄養データCSVの読み込み

use crate::error::Result;
use crate::types::NutritionRow;
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// 起動時に一度だけ読み込む栄養テーブル（以後は読み取り専用）
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    headers: Vec<String>,
    rows: Vec<NutritionRow>,
}

impl NutritionTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[NutritionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// CSVファイルから栄養テーブルを読み込む
pub fn load_nutrition_table(path: &Path) -> Result<NutritionTable> {
    let file = std::fs::File::open(path)?;
    let table = read_nutrition_table(file)?;
    tracing::info!(
        "栄養テーブルを読み込みました: {} ({}行)",
        path.display(),
        table.len()
    );
    Ok(table)
}

/// 任意のリーダーから栄養テーブルを読み込む
///
/// ヘッダーの前後の空白を除去し、ハードコードされたカラム名との不一致を防ぎます。
pub fn read_nutrition_table<R: Read>(reader: R) -> Result<NutritionTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;

        let mut fields = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(i) {
                fields.insert(header.clone(), value.to_string());
            }
        }

        rows.push(NutritionRow::new(fields));
    }

    Ok(NutritionTable { headers, rows })
}
