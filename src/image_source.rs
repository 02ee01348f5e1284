//! 入力画像の読み込み（ファイル・アップロードされたバイト列・カメラ撮影のdata URL）

use crate::error::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use std::path::Path;

/// 受け付ける拡張子
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 画像ファイルを読み込む
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let supported = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !supported {
        tracing::warn!("想定外の拡張子です。内容から形式を推定します: {}", path.display());
    }

    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// エンコード済みの画像バイト列をデコードする（形式は内容から推定）
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes)?;
    tracing::debug!(
        "画像をデコードしました: {}x{} {:?}",
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img)
}

/// `data:image/<fmt>;base64,<payload>` 形式の画像をデコードする
pub fn decode_data_url(url: &str) -> Result<DynamicImage> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::InvalidDataUrl("missing 'data:' prefix".to_string()))?;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidDataUrl("missing ',' separator".to_string()))?;

    let mut parts = meta.split(';');
    let mime = parts.next().unwrap_or_default();
    if !mime.starts_with("image/") {
        return Err(Error::InvalidDataUrl(format!("not an image: '{}'", mime)));
    }
    if !parts.any(|p| p == "base64") {
        return Err(Error::InvalidDataUrl("payload is not base64".to_string()));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::InvalidDataUrl(e.to_string()))?;

    decode_image(&bytes)
}
