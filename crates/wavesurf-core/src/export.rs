//! Exporting drawn tiles as images
//!
//! One image per drawn tile, in draw order, either as raw encoded bytes or
//! as `data:` URLs. JPEG has no alpha, so transparent pixels are composited
//! onto black first.

use std::rc::Rc;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::{WaveError, WaveResult};
use crate::surface::DrawnTile;

/// Default export MIME type
pub const DEFAULT_FORMAT: &str = "image/png";

/// Default JPEG quality
pub const DEFAULT_QUALITY: u8 = 100;

/// Shape of the export result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportType {
    #[default]
    DataUrl,
    Blob,
}

/// Exported tiles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportedImages {
    DataUrls(Vec<String>),
    Blobs(Vec<Vec<u8>>),
}

impl ExportedImages {
    pub fn len(&self) -> usize {
        match self {
            ExportedImages::DataUrls(urls) => urls.len(),
            ExportedImages::Blobs(blobs) => blobs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Png,
    Jpeg,
}

impl Format {
    fn parse(mime: &str) -> WaveResult<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(Format::Png),
            "image/jpeg" | "image/jpg" => Ok(Format::Jpeg),
            _ => Err(WaveError::UnsupportedFormat(mime.to_string())),
        }
    }

    fn mime(self) -> &'static str {
        match self {
            Format::Png => "image/png",
            Format::Jpeg => "image/jpeg",
        }
    }
}

fn encode(raster: &RgbaImage, format: Format, quality: u8) -> WaveResult<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        Format::Png => {
            PngEncoder::new(&mut bytes).write_image(
                raster.as_raw(),
                raster.width(),
                raster.height(),
                ExtendedColorType::Rgba8,
            )?;
        }
        Format::Jpeg => {
            let rgb: Vec<u8> = raster
                .pixels()
                .flat_map(|p| {
                    let [r, g, b, a] = p.0;
                    let over = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
                    [over(r), over(g), over(b)]
                })
                .collect();
            JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).write_image(
                &rgb,
                raster.width(),
                raster.height(),
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    Ok(bytes)
}

/// Encode every tile's waveform raster
///
/// `format` is a MIME type (`image/png` or `image/jpeg`); `quality` only
/// applies to JPEG.
pub fn export_tiles(
    tiles: &[Rc<DrawnTile>],
    format: &str,
    quality: u8,
    kind: ExportType,
) -> WaveResult<ExportedImages> {
    let format = Format::parse(format)?;
    if tiles.is_empty() {
        return Err(WaveError::NoData);
    }

    let blobs = tiles
        .iter()
        .map(|tile| encode(&tile.waveform, format, quality))
        .collect::<WaveResult<Vec<_>>>()?;
    log::debug!("export: {} tile(s) as {}", blobs.len(), format.mime());

    Ok(match kind {
        ExportType::Blob => ExportedImages::Blobs(blobs),
        ExportType::DataUrl => ExportedImages::DataUrls(
            blobs
                .iter()
                .map(|bytes| {
                    format!(
                        "data:{};base64,{}",
                        format.mime(),
                        base64::engine::general_purpose::STANDARD.encode(bytes)
                    )
                })
                .collect(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::TileKey;
    use image::Rgba;

    fn tile(index: usize) -> Rc<DrawnTile> {
        let raster = RgbaImage::from_pixel(4, 2, Rgba([200, 100, 50, 255]));
        Rc::new(DrawnTile {
            key: TileKey { lane: 0, index },
            left: index as f64 * 4.0,
            top: 0.0,
            width: 4.0,
            height: 2.0,
            waveform: raster.clone(),
            progress: raster,
        })
    }

    #[test]
    fn test_no_tiles_is_no_data() {
        let err = export_tiles(&[], DEFAULT_FORMAT, DEFAULT_QUALITY, ExportType::Blob).unwrap_err();
        assert!(matches!(err, WaveError::NoData));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = export_tiles(&[tile(0)], "image/gif", DEFAULT_QUALITY, ExportType::Blob).unwrap_err();
        assert!(matches!(err, WaveError::UnsupportedFormat(ref f) if f == "image/gif"));
    }

    #[test]
    fn test_png_blobs_one_per_tile() {
        let result = export_tiles(&[tile(0), tile(1)], "image/png", DEFAULT_QUALITY, ExportType::Blob).unwrap();
        let ExportedImages::Blobs(blobs) = result else {
            panic!("expected blobs");
        };
        assert_eq!(blobs.len(), 2);
        assert_eq!(&blobs[0][..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&blobs[0]).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 100, 50, 255]);
    }

    #[test]
    fn test_jpeg_data_urls() {
        let result = export_tiles(&[tile(0)], "image/jpeg", 80, ExportType::DataUrl).unwrap();
        let ExportedImages::DataUrls(urls) = result else {
            panic!("expected data urls");
        };
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("data:image/jpeg;base64,/9j/"));
    }
}
