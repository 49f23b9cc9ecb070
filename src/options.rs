//! Per-format encoder option resolution.
//!
//! The convert endpoint only exposes two generic knobs (`quality` and
//! `compression`); each output format interprets them differently. Resolution
//! happens once per batch, producing one variant of [`FormatOptions`] that
//! every file in the batch shares.

use crate::error::ConvertError;

/// The single TIFF scheme we emit. Lossless, widely readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    Lzw,
}

/// Resolved, format-specific encoder options.
///
/// Quality and effort values are carried as given (after defaulting); the
/// codec layer clamps them to each encoder's valid range.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatOptions {
    Jpeg {
        quality: i32,
        /// Route through mozjpeg instead of the baseline encoder.
        mozjpeg: bool,
    },
    Png {
        quality: i32,
        /// Deflate tradeoff, 0-9.
        compression_level: i32,
        /// Quantize to a bounded color table. Only worthwhile at lower
        /// fidelity targets.
        palette: bool,
    },
    Webp {
        quality: i32,
        /// CPU/size tradeoff, 0-6.
        effort: i32,
        lossless: bool,
    },
    Avif {
        quality: i32,
        /// CPU/size tradeoff, 0-9.
        effort: i32,
        lossless: bool,
    },
    Tiff {
        quality: i32,
        compression: TiffCompression,
    },
    Gif {
        /// CPU/size tradeoff, 1-10. Quality is ignored for GIF.
        effort: i32,
    },
}

fn parse_or(raw: Option<&str>, default: i32) -> i32 {
    raw.and_then(|s| s.trim().parse::<i32>().ok())
        .unwrap_or(default)
}

impl FormatOptions {
    /// Map a requested format token plus the raw `quality`/`compression`
    /// form fields to a validated option set. Unparseable or absent values
    /// fall back to the format's default. Unknown tokens fail the whole
    /// request before any file is touched.
    pub fn resolve(
        format: &str,
        raw_quality: Option<&str>,
        raw_compression: Option<&str>,
    ) -> Result<Self, ConvertError> {
        match format {
            "jpeg" | "jpg" => Ok(FormatOptions::Jpeg {
                quality: parse_or(raw_quality, 80),
                mozjpeg: true,
            }),
            "png" => {
                let quality = parse_or(raw_quality, 80);
                Ok(FormatOptions::Png {
                    quality,
                    compression_level: parse_or(raw_compression, 6),
                    palette: quality < 50,
                })
            }
            "webp" => {
                let quality = parse_or(raw_quality, 80);
                Ok(FormatOptions::Webp {
                    quality,
                    effort: parse_or(raw_compression, 4),
                    lossless: quality >= 100,
                })
            }
            "avif" => {
                let quality = parse_or(raw_quality, 50);
                Ok(FormatOptions::Avif {
                    quality,
                    effort: parse_or(raw_compression, 4),
                    lossless: quality >= 100,
                })
            }
            "tiff" => Ok(FormatOptions::Tiff {
                quality: parse_or(raw_quality, 80),
                compression: TiffCompression::Lzw,
            }),
            "gif" => Ok(FormatOptions::Gif {
                effort: parse_or(raw_compression, 7),
            }),
            other => Err(ConvertError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Canonical output extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatOptions::Jpeg { .. } => "jpg",
            FormatOptions::Png { .. } => "png",
            FormatOptions::Webp { .. } => "webp",
            FormatOptions::Avif { .. } => "avif",
            FormatOptions::Tiff { .. } => "tiff",
            FormatOptions::Gif { .. } => "gif",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_format() {
        assert_eq!(
            FormatOptions::resolve("jpeg", None, None).unwrap(),
            FormatOptions::Jpeg { quality: 80, mozjpeg: true }
        );
        assert_eq!(
            FormatOptions::resolve("png", None, None).unwrap(),
            FormatOptions::Png { quality: 80, compression_level: 6, palette: false }
        );
        assert_eq!(
            FormatOptions::resolve("webp", None, None).unwrap(),
            FormatOptions::Webp { quality: 80, effort: 4, lossless: false }
        );
        assert_eq!(
            FormatOptions::resolve("avif", None, None).unwrap(),
            FormatOptions::Avif { quality: 50, effort: 4, lossless: false }
        );
        assert_eq!(
            FormatOptions::resolve("tiff", None, None).unwrap(),
            FormatOptions::Tiff { quality: 80, compression: TiffCompression::Lzw }
        );
        assert_eq!(
            FormatOptions::resolve("gif", None, None).unwrap(),
            FormatOptions::Gif { effort: 7 }
        );
    }

    #[test]
    fn unparseable_values_take_defaults() {
        assert_eq!(
            FormatOptions::resolve("jpeg", Some("best"), None).unwrap(),
            FormatOptions::Jpeg { quality: 80, mozjpeg: true }
        );
        assert_eq!(
            FormatOptions::resolve("png", Some(""), Some("fast")).unwrap(),
            FormatOptions::Png { quality: 80, compression_level: 6, palette: false }
        );
    }

    #[test]
    fn png_palette_threshold() {
        let low = FormatOptions::resolve("png", Some("30"), None).unwrap();
        assert!(matches!(low, FormatOptions::Png { palette: true, .. }));

        let high = FormatOptions::resolve("png", Some("70"), None).unwrap();
        assert!(matches!(high, FormatOptions::Png { palette: false, .. }));
    }

    #[test]
    fn lossless_switchover_at_quality_100() {
        for fmt in ["webp", "avif"] {
            let at = FormatOptions::resolve(fmt, Some("100"), None).unwrap();
            let below = FormatOptions::resolve(fmt, Some("99"), None).unwrap();
            match (at, below) {
                (
                    FormatOptions::Webp { lossless: a, .. },
                    FormatOptions::Webp { lossless: b, .. },
                )
                | (
                    FormatOptions::Avif { lossless: a, .. },
                    FormatOptions::Avif { lossless: b, .. },
                ) => {
                    assert!(a);
                    assert!(!b);
                }
                other => panic!("unexpected variants: {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        for token in ["bmp", "JPEG", "heic", ""] {
            assert!(matches!(
                FormatOptions::resolve(token, None, None),
                Err(ConvertError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn jpg_and_jpeg_share_an_extension() {
        assert_eq!(FormatOptions::resolve("jpeg", None, None).unwrap().extension(), "jpg");
        assert_eq!(FormatOptions::resolve("jpg", None, None).unwrap().extension(), "jpg");
    }
}
