//! Batch conversion pipeline.
//!
//! Files are processed strictly in submission order, sequentially, sharing
//! one resolved option set and one output-directory snapshot. The batch is
//! all-or-nothing: the first codec or write failure aborts it, and files the
//! batch already wrote are removed again (best effort).

use crate::codec;
use crate::error::ConvertError;
use crate::filename;
use crate::options::FormatOptions;
use crate::output_dir::OutputDir;
use humansize::{format_size, DECIMAL};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// One uploaded file part, exactly as received.
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Raw form fields of one convert request.
pub struct ConversionRequest {
    pub format: String,
    pub quality: Option<String>,
    pub compression: Option<String>,
    pub files: Vec<UploadedFile>,
}

/// Per-file outcome, serialized in the original wire shape.
#[derive(Debug, Serialize)]
pub struct ConversionResult {
    pub original: String,
    pub converted: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub output_dir: PathBuf,
    pub results: Vec<ConversionResult>,
}

/// Convert every file in the request, in order.
///
/// Validation (`EmptyBatch`, `UnsupportedFormat`) happens before any side
/// effect; the output directory is snapshotted and ensured exactly once, so
/// a concurrent `set-output` cannot redirect a batch mid-flight.
pub fn convert_batch(
    request: ConversionRequest,
    output_dir: &OutputDir,
) -> Result<BatchOutcome, ConvertError> {
    if request.files.is_empty() {
        return Err(ConvertError::EmptyBatch);
    }

    let opts = FormatOptions::resolve(
        &request.format,
        request.quality.as_deref(),
        request.compression.as_deref(),
    )?;

    let dir = output_dir.ensure()?;

    let mut results = Vec::with_capacity(request.files.len());
    for file in &request.files {
        match convert_one(file, &opts, &dir) {
            Ok(result) => results.push(result),
            Err(err) => {
                log::error!(
                    "aborting batch at {} (format {}): {err}",
                    file.name,
                    request.format
                );
                discard_partial(&results);
                return Err(err);
            }
        }
    }

    Ok(BatchOutcome {
        output_dir: dir,
        results,
    })
}

fn convert_one(
    file: &UploadedFile,
    opts: &FormatOptions,
    dir: &std::path::Path,
) -> Result<ConversionResult, ConvertError> {
    let original = filename::normalize(&file.name);
    let converted = format!("{}.{}", filename::base_name(&original), opts.extension());
    let path = dir.join(&converted);

    let encoded = codec::transcode(&file.bytes, opts).map_err(|e| ConvertError::Codec {
        file: original.clone(),
        message: e.to_string(),
    })?;

    // Same-name overwrite within and across batches: last writer wins.
    fs::write(&path, &encoded.bytes).map_err(|e| ConvertError::Write {
        path: path.clone(),
        message: e.to_string(),
    })?;

    log::info!(
        "converted {original} -> {converted} ({}, {}x{})",
        format_size(encoded.bytes.len() as u64, DECIMAL),
        encoded.width,
        encoded.height,
    );

    Ok(ConversionResult {
        original,
        converted,
        size: encoded.bytes.len() as u64,
        width: encoded.width,
        height: encoded.height,
        path,
    })
}

/// Remove files an aborted batch already produced. The response promises
/// nothing durable on failure, so leftovers would only mislead.
fn discard_partial(results: &[ConversionResult]) {
    for result in results {
        if let Err(e) = fs::remove_file(&result.path) {
            log::warn!("could not remove partial output {}: {e}", result.path.display());
        }
    }
}
