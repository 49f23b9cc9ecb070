//! Upload filename repair.
//!
//! Browsers send multipart filenames as UTF-8, but some upload stacks decode
//! them byte-per-char (latin1), turning e.g. Korean names into mojibake.
//! `normalize` undoes that reinterpretation when possible and settles on NFC
//! so visually identical names compare equal regardless of how the client OS
//! decomposed accented characters.

use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Best-effort repair of a mis-decoded filename, then NFC normalization.
///
/// If every char fits in a single byte the string is a candidate for having
/// been decoded as latin1; reinterpret those bytes as UTF-8. Invalid UTF-8
/// means the name really was latin1 text, so keep it as-is. A name already
/// containing chars above U+00FF was decoded correctly and is left alone.
pub fn normalize(raw: &str) -> String {
    let repaired = if raw.chars().all(|c| (c as u32) <= 0xFF) {
        let bytes: Vec<u8> = raw.chars().map(|c| c as u8).collect();
        String::from_utf8(bytes).unwrap_or_else(|_| raw.to_string())
    } else {
        raw.to_string()
    };
    repaired.nfc().collect()
}

/// Strip the final extension, keeping the rest of the name intact.
pub fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}
