//! # 内容分类器
//!
//! ## 设计思路
//!
//! 按固定优先级依次尝试，首个命中即返回：
//!
//! 1. **图片**：存在图片负载时优先取无损格式，并立即复制出自持有缓冲（冻结）
//! 2. **CSV**：含制表符，且解析后有效行数 ≥ 2、每行列数 ≥ 2
//! 3. **JSON**：去除首尾空白后以 `{` / `[` 开头，且能被严格解析
//! 4. **Markdown**：命中任一 Markdown 特征
//! 5. **文本**：非纯空白的其余文本
//! 6. **None**：空剪贴板、纯空白文本或不支持的负载
//!
//! ## 实现思路
//!
//! - CSV 优先于 Markdown：`# Title\tValue` 会被判为 CSV，这是既定行为。
//! - 编码格式的图片负载用 `image` crate 解码为 RGBA；解码失败的负载跳过，
//!   全部失败时回落到文本规则。

use std::io::Cursor;

use image::ImageFormat;

use super::delimited::parse_or_split;
use super::markdown_detection::is_likely_markdown;
use super::{ContentVariant, ImageContent, PixelFormat};
use crate::clipboard::{ClipboardSnapshot, ImagePayload, RawPixels, TransportFormat};

/// 对剪贴板快照进行分类。
pub fn classify(snapshot: &ClipboardSnapshot) -> ContentVariant {
    if snapshot.has_image() {
        if let Some(image) = freeze_preferred_image(snapshot.images()) {
            log::debug!(
                "🖼️ 分类为图片 {}x{} ({:?})",
                image.width,
                image.height,
                image.pixel_format
            );
            return ContentVariant::Image(image);
        }
    }

    match snapshot.text() {
        Some(text) => classify_text(text),
        None => ContentVariant::None,
    }
}

/// 对纯文本进行分类（图片之后的规则）。
pub(crate) fn classify_text(text: &str) -> ContentVariant {
    if text.trim().is_empty() {
        return ContentVariant::None;
    }

    if let Some(csv) = try_classify_csv(text) {
        return csv;
    }

    if let Some(json) = try_classify_json(text) {
        return json;
    }

    if is_likely_markdown(text) {
        return ContentVariant::Markdown(text.to_string());
    }

    ContentVariant::Text(text.to_string())
}

fn try_classify_csv(text: &str) -> Option<ContentVariant> {
    if !text.contains('\t') {
        return None;
    }

    let rows = parse_or_split(text, '\t');

    if rows.len() < 2 || rows.iter().any(|row| row.len() < 2) {
        return None;
    }

    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    Some(ContentVariant::Csv {
        raw_tab_text: text.to_string(),
        row_count: rows.len(),
        column_count,
    })
}

fn try_classify_json(text: &str) -> Option<ContentVariant> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }

    let value = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("⚠️ 疑似 JSON 但解析失败，按普通文本处理: {}", err);
            return None;
        }
    };

    let formatted = match serde_json::to_string_pretty(&value) {
        Ok(formatted) => formatted,
        Err(err) => {
            log::warn!("JSON 重新序列化失败: {}", err);
            return None;
        }
    };

    Some(ContentVariant::Json {
        raw: text.to_string(),
        formatted,
    })
}

fn freeze_preferred_image(payloads: &[ImagePayload]) -> Option<ImageContent> {
    let mut ordered: Vec<&ImagePayload> = payloads.iter().collect();
    ordered.sort_by_key(|payload| payload.preference_rank());

    ordered.into_iter().find_map(|payload| match freeze_image(payload) {
        Ok(image) => Some(image),
        Err(reason) => {
            log::debug!("🚫 跳过无法使用的图片负载: {}", reason);
            None
        }
    })
}

fn freeze_image(payload: &ImagePayload) -> Result<ImageContent, String> {
    match payload {
        ImagePayload::Pixels(raw) => freeze_raw_pixels(raw),
        ImagePayload::Encoded { format, bytes } => decode_transport(*format, bytes),
    }
}

fn freeze_raw_pixels(raw: &RawPixels) -> Result<ImageContent, String> {
    if raw.width == 0 || raw.height == 0 {
        return Err("图片尺寸为 0".to_string());
    }

    let expected = (raw.width as usize)
        .checked_mul(raw.height as usize)
        .and_then(|pixels| pixels.checked_mul(raw.format.bytes_per_pixel()))
        .ok_or_else(|| "图片尺寸溢出".to_string())?;

    if raw.bytes.len() < expected {
        return Err(format!("像素数据不足：期望 {} 字节，实际 {} 字节", expected, raw.bytes.len()));
    }

    Ok(ImageContent {
        pixels: raw.bytes[..expected].to_vec(),
        width: raw.width,
        height: raw.height,
        pixel_format: raw.format,
    })
}

fn decode_transport(format: TransportFormat, bytes: &[u8]) -> Result<ImageContent, String> {
    let image_format = match format {
        TransportFormat::Png => ImageFormat::Png,
        TransportFormat::Bmp => ImageFormat::Bmp,
        TransportFormat::Jpeg => ImageFormat::Jpeg,
    };

    let decoded = image::load(Cursor::new(bytes), image_format)
        .map_err(|e| format!("{:?} 解码失败: {}", format, e))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err("图片尺寸为 0".to_string());
    }

    Ok(ImageContent {
        pixels: rgba.into_raw(),
        width,
        height,
        pixel_format: PixelFormat::Rgba8,
    })
}
