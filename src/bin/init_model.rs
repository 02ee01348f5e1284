//! 学習前の分類モデルアーカイブを書き出す
//!
//! 重みはランダム初期化のままなので予測結果に意味はありませんが、
//! 学習済みの重みが用意できる前にパイプライン全体を動かす確認に使えます。

use anyhow::Result;
use std::path::PathBuf;

use fruity_nutrition::ml::InferenceEngine;
use fruity_nutrition::model::{print_metadata_info, AppConfig, DeviceType, ModelMetadata};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    // コマンドライン引数を取得
    let args: Vec<String> = std::env::args().collect();
    let output_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from(AppConfig::load_or_default(AppConfig::default_path()).model.model_path)
    };

    let mut metadata = ModelMetadata::default();
    metadata.description = Some("untrained scaffold".to_string());

    let engine = InferenceEngine::init_untrained(metadata, DeviceType::Cpu)?;
    let saved = engine.save(&output_path)?;

    println!("モデルを書き出しました: {}", saved.display());
    print_metadata_info(engine.metadata());
    Ok(())
}
