//! # 内容编码器
//!
//! ## 设计思路
//!
//! `encode` 是纯函数：输入内容变体与设置快照，输出落盘字节与扩展名，不做任何 I/O。
//!
//! | 变体 | 输出 |
//! |------|------|
//! | 图片 | PNG（无损）或 JPEG（先合成到白底，再按质量压缩） |
//! | 文本 / Markdown | UTF-8，`txt` / `md` |
//! | JSON | 格式化后的 UTF-8 文本，`json` |
//! | CSV | **带 BOM** 的 UTF-8，`csv`，字段重新转义 |
//!
//! ## 实现思路
//!
//! - 先校验像素缓冲长度，再按像素格式转换为 `image` crate 可直接编码的布局。
//! - BGRA 在编码前交换通道；无 Alpha 通道的格式直接编码。
//! - `None` 变体属于调用约定违例，立即返回 `EncodeError::NothingToEncode`。

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::delimited::tab_text_to_csv;
use super::{ContentVariant, EncodeError, ImageContent, PixelFormat};
use crate::settings::{ImageFormat, SaveSettings};

/// CSV 文件头部的 UTF-8 BOM，表格软件据此识别编码。
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// 编码结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContent {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// 将内容变体编码为落盘字节。
pub fn encode(variant: &ContentVariant, settings: &SaveSettings) -> Result<EncodedContent, EncodeError> {
    match variant {
        ContentVariant::Image(image) => encode_image(image, settings),
        ContentVariant::Text(text) => Ok(EncodedContent {
            bytes: text.as_bytes().to_vec(),
            extension: "txt",
        }),
        ContentVariant::Markdown(text) => Ok(EncodedContent {
            bytes: text.as_bytes().to_vec(),
            extension: "md",
        }),
        ContentVariant::Json { formatted, .. } => Ok(EncodedContent {
            bytes: formatted.as_bytes().to_vec(),
            extension: "json",
        }),
        ContentVariant::Csv { raw_tab_text, .. } => {
            let csv = tab_text_to_csv(raw_tab_text);
            let mut bytes = Vec::with_capacity(UTF8_BOM.len() + csv.len());
            bytes.extend_from_slice(&UTF8_BOM);
            bytes.extend_from_slice(csv.as_bytes());
            Ok(EncodedContent { bytes, extension: "csv" })
        }
        ContentVariant::None => Err(EncodeError::NothingToEncode),
    }
}

fn encode_image(image: &ImageContent, settings: &SaveSettings) -> Result<EncodedContent, EncodeError> {
    validate_buffer(image)?;

    match settings.image_format {
        ImageFormat::Png => Ok(EncodedContent {
            bytes: encode_png(image)?,
            extension: "png",
        }),
        ImageFormat::Jpg => Ok(EncodedContent {
            bytes: encode_jpeg(image, settings.jpg_quality)?,
            extension: "jpg",
        }),
    }
}

fn validate_buffer(image: &ImageContent) -> Result<(), EncodeError> {
    if image.pixel_format == PixelFormat::Cmyk8 {
        return Err(EncodeError::UnsupportedPixelFormat(image.pixel_format));
    }

    let expected = (image.width as usize)
        .checked_mul(image.height as usize)
        .and_then(|pixels| pixels.checked_mul(image.pixel_format.bytes_per_pixel()))
        .ok_or(EncodeError::BufferSizeMismatch { expected: usize::MAX, actual: image.pixels.len() })?;

    if expected == 0 || image.pixels.len() != expected {
        return Err(EncodeError::BufferSizeMismatch {
            expected,
            actual: image.pixels.len(),
        });
    }
    Ok(())
}

fn bgra_to_rgba(pixels: &[u8]) -> Vec<u8> {
    let mut out = pixels.to_vec();
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    out
}

/// Alpha 合成到白色背景：`c * a + 255 * (1 - a)`。
fn blend_on_white(channel: u8, alpha: u8) -> u8 {
    let c = channel as u32;
    let a = alpha as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// 带 Alpha 的像素合成到白底，输出 RGB（灰度图输出 L8）。
fn flatten_on_white(image: &ImageContent) -> (Vec<u8>, ExtendedColorType) {
    let stride = image.pixel_format.bytes_per_pixel();
    let alpha = stride - 1;
    let channels: &[usize] = match image.pixel_format {
        PixelFormat::Bgra8 => &[2, 1, 0],
        PixelFormat::LumaA8 => &[0],
        _ => &[0, 1, 2],
    };
    let data = image
        .pixels
        .chunks_exact(stride)
        .flat_map(|px| channels.iter().map(move |&i| blend_on_white(px[i], px[alpha])))
        .collect();
    let color = if channels.len() == 1 { ExtendedColorType::L8 } else { ExtendedColorType::Rgb8 };
    (data, color)
}

fn encode_png(image: &ImageContent) -> Result<Vec<u8>, EncodeError> {
    let (data, color) = match image.pixel_format {
        PixelFormat::Rgba8 => (image.pixels.clone(), ExtendedColorType::Rgba8),
        PixelFormat::Bgra8 => (bgra_to_rgba(&image.pixels), ExtendedColorType::Rgba8),
        PixelFormat::Rgb8 => (image.pixels.clone(), ExtendedColorType::Rgb8),
        PixelFormat::Luma8 => (image.pixels.clone(), ExtendedColorType::L8),
        PixelFormat::LumaA8 => (image.pixels.clone(), ExtendedColorType::La8),
        PixelFormat::Cmyk8 => return Err(EncodeError::UnsupportedPixelFormat(image.pixel_format)),
    };

    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(&data, image.width, image.height, color)
        .map_err(|e| EncodeError::Image(format!("PNG 编码失败: {}", e)))?;
    Ok(buf)
}

fn encode_jpeg(image: &ImageContent, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if !(1..=100).contains(&quality) {
        return Err(EncodeError::InvalidQuality(quality));
    }

    let (data, color) = if image.pixel_format.has_alpha() {
        flatten_on_white(image)
    } else {
        match image.pixel_format {
            PixelFormat::Rgb8 => (image.pixels.clone(), ExtendedColorType::Rgb8),
            PixelFormat::Luma8 => (image.pixels.clone(), ExtendedColorType::L8),
            other => return Err(EncodeError::UnsupportedPixelFormat(other)),
        }
    };

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(&data, image.width, image.height, color)
        .map_err(|e| EncodeError::Image(format!("JPEG 编码失败: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::delimited::parse_delimited;

    fn settings(format: ImageFormat, quality: u8) -> SaveSettings {
        SaveSettings {
            image_format: format,
            jpg_quality: quality,
            ..SaveSettings::default()
        }
    }

    fn rgba_image(width: u32, height: u32, pixel: [u8; 4]) -> ImageContent {
        ImageContent {
            pixels: pixel.repeat((width * height) as usize),
            width,
            height,
            pixel_format: PixelFormat::Rgba8,
        }
    }

    #[test]
    fn csv_has_bom_and_crlf_rows() {
        let variant = ContentVariant::Csv {
            raw_tab_text: "A\tB\n1\t2".to_string(),
            row_count: 2,
            column_count: 2,
        };
        let encoded = encode(&variant, &SaveSettings::default()).expect("csv encode");

        assert_eq!(encoded.extension, "csv");
        assert_eq!(&encoded.bytes[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(&encoded.bytes[3..], b"A,B\r\n1,2\r\n");
    }

    #[test]
    fn csv_reparses_to_the_same_cells() {
        let tab = "name\tnote\n\"Smith, J\"\t\"said \"\"hi\"\"\"\nx\t\"multi\nline\"";
        let variant = ContentVariant::Csv { raw_tab_text: tab.to_string(), row_count: 3, column_count: 2 };
        let encoded = encode(&variant, &SaveSettings::default()).expect("csv encode");
        let csv = String::from_utf8(encoded.bytes[3..].to_vec()).expect("utf8");

        assert_eq!(
            parse_delimited(&csv, ',').expect("csv parse"),
            parse_delimited(tab, '\t').expect("tab parse")
        );
    }

    #[test]
    fn text_like_variants_round_trip_exactly() {
        let text = "héllo\nworld  ";
        let encoded = encode(&ContentVariant::Text(text.to_string()), &SaveSettings::default()).expect("text");
        assert_eq!(encoded.extension, "txt");
        assert_eq!(String::from_utf8(encoded.bytes).expect("utf8"), text);

        let md = "# Title\n- item";
        let encoded = encode(&ContentVariant::Markdown(md.to_string()), &SaveSettings::default()).expect("md");
        assert_eq!(encoded.extension, "md");
        assert_eq!(String::from_utf8(encoded.bytes).expect("utf8"), md);

        let variant = ContentVariant::Json {
            raw: "{\"a\":1}".to_string(),
            formatted: "{\n  \"a\": 1\n}".to_string(),
        };
        let encoded = encode(&variant, &SaveSettings::default()).expect("json");
        assert_eq!(encoded.extension, "json");
        let reparsed: serde_json::Value = serde_json::from_slice(&encoded.bytes).expect("valid json");
        assert_eq!(reparsed, serde_json::json!({"a": 1}));
    }

    #[test]
    fn none_variant_is_rejected() {
        let result = encode(&ContentVariant::None, &SaveSettings::default());
        assert!(matches!(result, Err(EncodeError::NothingToEncode)));
    }

    #[test]
    fn png_is_lossless() {
        let image = ImageContent {
            pixels: vec![255, 0, 0, 255, 0, 255, 0, 128],
            width: 2,
            height: 1,
            pixel_format: PixelFormat::Rgba8,
        };
        let encoded = encode(&ContentVariant::Image(image.clone()), &settings(ImageFormat::Png, 90)).expect("png");
        assert_eq!(encoded.extension, "png");

        let decoded = image::load_from_memory(&encoded.bytes).expect("decode").to_rgba8();
        assert_eq!(decoded.into_raw(), image.pixels);
    }

    #[test]
    fn bgra_channels_are_swapped_for_png() {
        let image = ImageContent {
            pixels: vec![10, 20, 30, 255],
            width: 1,
            height: 1,
            pixel_format: PixelFormat::Bgra8,
        };
        let encoded = encode(&ContentVariant::Image(image), &settings(ImageFormat::Png, 90)).expect("png");
        let decoded = image::load_from_memory(&encoded.bytes).expect("decode").to_rgba8();
        assert_eq!(decoded.into_raw(), vec![30, 20, 10, 255]);
    }

    #[test]
    fn transparent_pixels_become_white_in_jpeg() {
        let image = rgba_image(8, 8, [0, 0, 0, 0]);
        let encoded = encode(&ContentVariant::Image(image), &settings(ImageFormat::Jpg, 100)).expect("jpeg");
        assert_eq!(encoded.extension, "jpg");

        let decoded = image::load_from_memory(&encoded.bytes).expect("decode").to_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c >= 250)));
    }

    #[test]
    fn alpha_formats_flatten_to_opaque_channels() {
        let bgra = ImageContent {
            pixels: vec![10, 20, 30, 255, 0, 0, 0, 0],
            width: 2,
            height: 1,
            pixel_format: PixelFormat::Bgra8,
        };
        assert_eq!(
            flatten_on_white(&bgra),
            (vec![30, 20, 10, 255, 255, 255], ExtendedColorType::Rgb8)
        );

        let luma = ImageContent {
            pixels: vec![40, 255, 40, 0],
            width: 2,
            height: 1,
            pixel_format: PixelFormat::LumaA8,
        };
        assert_eq!(flatten_on_white(&luma), (vec![40, 255], ExtendedColorType::L8));
    }

    #[test]
    fn blend_on_white_endpoints() {
        assert_eq!(blend_on_white(0, 0), 255);
        assert_eq!(blend_on_white(0, 255), 0);
        assert_eq!(blend_on_white(200, 255), 200);
        assert_eq!(blend_on_white(0, 128), 127);
    }

    #[test]
    fn rgb_without_alpha_is_encoded_as_is() {
        let image = ImageContent {
            pixels: [200u8, 100, 50].repeat(16),
            width: 4,
            height: 4,
            pixel_format: PixelFormat::Rgb8,
        };
        let encoded = encode(&ContentVariant::Image(image), &settings(ImageFormat::Jpg, 95)).expect("jpeg");
        let decoded = image::load_from_memory(&encoded.bytes).expect("decode").to_rgb8();
        let px = decoded.get_pixel(1, 1).0;
        assert!(px[0].abs_diff(200) < 8 && px[1].abs_diff(100) < 8 && px[2].abs_diff(50) < 8);
    }

    #[test]
    fn structural_failures_are_reported() {
        let cmyk = ImageContent { pixels: vec![0; 4], width: 1, height: 1, pixel_format: PixelFormat::Cmyk8 };
        let err = encode(&ContentVariant::Image(cmyk), &SaveSettings::default()).expect_err("cmyk unsupported");
        assert!(err.is_structural());

        let short = ImageContent { pixels: vec![0; 3], width: 1, height: 1, pixel_format: PixelFormat::Rgba8 };
        let err = encode(&ContentVariant::Image(short), &SaveSettings::default()).expect_err("short buffer");
        assert!(matches!(err, EncodeError::BufferSizeMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let image = rgba_image(1, 1, [0, 0, 0, 255]);
        let err = encode(&ContentVariant::Image(image), &settings(ImageFormat::Jpg, 0)).expect_err("quality 0");
        assert!(matches!(err, EncodeError::InvalidQuality(0)));
    }
}
