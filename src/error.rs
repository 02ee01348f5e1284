//! ライブラリ共通のエラー型

use thiserror::Error;

/// パイプライン全体で使うエラー
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// 起動時のモデル読み込みに失敗した状態で推論しようとした
    #[error("Model is not available: {0}")]
    ModelUnavailable(String),

    #[error("Model archive error: {0}")]
    ModelArchive(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Score vector has {actual} entries, expected {expected}")]
    ScoreLength { expected: usize, actual: usize },

    #[error("Input tensor shape {actual:?} does not match model input {expected:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: [usize; 4],
    },

    #[error("Column not found in nutrition table: {0}")]
    MissingColumn(String),
}

pub type Result<T> = std::result::Result<T, Error>;
