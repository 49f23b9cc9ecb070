//! Decode/encode plumbing over the Rust-native codec crates.
//!
//! One entry point, [`transcode`]: decode the uploaded bytes with the `image`
//! crate, then hand the pixel buffer to the encoder selected by the resolved
//! [`FormatOptions`]. Each encoder clamps quality/effort to its own valid
//! range; the resolver passes values through untouched.

use crate::options::{FormatOptions, TiffCompression};
use anyhow::{anyhow, Result};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use imagequant::Attributes;
use mozjpeg::{ColorSpace, Compress, ScanMode};
use oxipng::{optimize_from_memory, Options as OxipngOptions, StripChunks};
use ravif::Encoder as AvifEncoder;
use std::io::Cursor;
use webp::{Encoder as WebpEncoder, WebPConfig};

/// Output of one decode+encode pass.
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode `input` and re-encode it according to `opts`.
pub fn transcode(input: &[u8], opts: &FormatOptions) -> Result<EncodedImage> {
    let img = image::load_from_memory(input)?;
    let (width, height) = (img.width(), img.height());

    let bytes = match opts {
        FormatOptions::Jpeg { quality, mozjpeg } => encode_jpeg(&img, *quality, *mozjpeg)?,
        FormatOptions::Png {
            quality,
            compression_level,
            palette,
        } => encode_png(&img, *quality, *compression_level, *palette)?,
        FormatOptions::Webp {
            quality,
            effort,
            lossless,
        } => encode_webp(&img, *quality, *effort, *lossless)?,
        FormatOptions::Avif {
            quality,
            effort,
            lossless,
        } => encode_avif(&img, *quality, *effort, *lossless)?,
        FormatOptions::Tiff { quality, compression } => encode_tiff(&img, *quality, *compression)?,
        FormatOptions::Gif { effort } => encode_gif(&img, *effort)?,
    };

    Ok(EncodedImage { bytes, width, height })
}

/// JPEG: mozjpeg (progressive, optimized scans) or the baseline encoder.
fn encode_jpeg(img: &DynamicImage, quality: i32, use_mozjpeg: bool) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width(), rgb.height());
    let quality = quality.clamp(0, 100);

    if !use_mozjpeg {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality as u8).write_image(
            rgb.as_raw(),
            w,
            h,
            ExtendedColorType::Rgb8,
        )?;
        return Ok(out);
    }

    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(w as usize, h as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

    let mut dest = Vec::new();
    let mut writer = comp.start_compress(&mut dest)?;
    writer.write_scanlines(&rgb.into_raw())?;
    writer.finish()?;

    Ok(dest)
}

/// PNG: straight encode, or quantize through libimagequant when palette mode
/// is requested, followed by an oxipng pass that re-indexes the result.
fn encode_png(img: &DynamicImage, quality: i32, compression_level: i32, palette: bool) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());

    let raw = if palette {
        quantize_rgba(rgba.as_raw(), w as usize, h as usize, quality)?
    } else {
        rgba.into_raw()
    };

    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression_type(compression_level), FilterType::Adaptive)
        .write_image(&raw, w, h, ExtendedColorType::Rgba8)?;

    if palette {
        // Quantization alone leaves an RGBA image; oxipng converts it back
        // to an indexed PNG and strips non-essential chunks.
        let mut opts = OxipngOptions::from_preset(compression_level.clamp(0, 6) as u8);
        opts.strip = StripChunks::Safe;
        out = optimize_from_memory(&out, &opts)?;
    }

    Ok(out)
}

/// The deflate knob is 0-9 upstream; the `image` encoder exposes three tiers.
fn compression_type(level: i32) -> CompressionType {
    match level {
        i32::MIN..=2 => CompressionType::Fast,
        3..=7 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn quantize_rgba(raw: &[u8], w: usize, h: usize, quality: i32) -> Result<Vec<u8>> {
    let pixels: Vec<rgb::RGBA<u8>> = raw
        .chunks_exact(4)
        .map(|px| rgb::RGBA::new(px[0], px[1], px[2], px[3]))
        .collect();

    let mut attr = Attributes::new();
    attr.set_speed(3)?;
    attr.set_quality(0, quality.clamp(0, 100) as u8)?;

    let mut liq = imagequant::Image::new(&attr, pixels, w, h, 0.0)?;
    let mut res = attr.quantize(&mut liq)?;
    res.set_dithering_level(1.0)?;
    let (palette, indices) = res.remapped(&mut liq)?;

    let mut expanded = Vec::with_capacity(w * h * 4);
    for idx in indices {
        let p = palette[idx as usize];
        expanded.extend_from_slice(&[p.r, p.g, p.b, p.a]);
    }
    Ok(expanded)
}

fn encode_webp(img: &DynamicImage, quality: i32, effort: i32, lossless: bool) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let mut config =
        WebPConfig::new().map_err(|_| anyhow!("failed to initialize webp config"))?;
    config.quality = quality.clamp(0, 100) as f32;
    config.method = effort.clamp(0, 6);
    config.lossless = lossless as i32;

    let encoder = WebpEncoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let mem = encoder
        .encode_advanced(&config)
        .map_err(|e| anyhow!("webp encoding failed: {e:?}"))?;
    Ok(mem.to_vec())
}

fn encode_avif(img: &DynamicImage, quality: i32, effort: i32, lossless: bool) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width() as usize, rgba.height() as usize);
    let pixels: Vec<rgb::RGBA<u8>> = rgba
        .as_raw()
        .chunks_exact(4)
        .map(|px| rgb::RGBA::new(px[0], px[1], px[2], px[3]))
        .collect();

    // ravif has no dedicated lossless mode; quality 100 is its ceiling.
    let quality = if lossless { 100 } else { quality.clamp(0, 100) };
    // ravif speed runs 1 (slowest) to 10; our effort knob runs the other way.
    let speed = (10 - effort.clamp(0, 9)) as u8;

    let encoded = AvifEncoder::new()
        .with_quality(quality as f32)
        .with_speed(speed)
        .encode_rgba(ravif::Img::new(pixels.as_slice(), w, h))?;
    Ok(encoded.avif_file)
}

fn encode_tiff(img: &DynamicImage, quality: i32, compression: TiffCompression) -> Result<Vec<u8>> {
    // Single lossless scheme; quality has no effect on TIFF output.
    debug_assert_eq!(compression, TiffCompression::Lzw);
    log::debug!("tiff encode (quality {quality} ignored, scheme {compression:?})");

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Tiff)?;
    Ok(cursor.into_inner())
}

fn encode_gif(img: &DynamicImage, effort: i32) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());

    // GIF effort runs 1-10 (slower = smaller); the encoder's speed knob runs
    // 1-30 the other way.
    let speed = 31 - 3 * effort.clamp(1, 10);

    let mut out = Vec::new();
    GifEncoder::new_with_speed(&mut out, speed).encode(
        rgba.as_raw(),
        w,
        h,
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}
