//! MIME and extension sniffing
//!
//! MIME types are derived from the file's actual header bytes, never from the
//! client-declared content type. Extensions are derived purely from the
//! filename suffix.

use std::io::{Read, Seek, SeekFrom};

/// Number of header bytes inspected for type detection.
pub const SNIFF_LEN: usize = 1024;

/// Sniff the MIME type of a seekable stream by reading up to [`SNIFF_LEN`]
/// header bytes. The stream position is restored before returning.
pub fn sniff_mime_type<R: Read + Seek>(reader: &mut R) -> std::io::Result<String> {
    let initial_pos = reader.stream_position()?;
    reader.seek(SeekFrom::Start(0))?;

    let mut buf = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    reader.seek(SeekFrom::Start(initial_pos))?;
    Ok(mime_from_bytes(&buf[..filled]))
}

/// Detect a MIME type from raw header bytes.
///
/// Magic-byte detection via `infer` is authoritative for binary formats.
/// Data without a recognizable signature falls back to `text/plain` when the
/// sample decodes as NUL-free UTF-8, otherwise `application/octet-stream`.
pub fn mime_from_bytes(data: &[u8]) -> String {
    if data.is_empty() {
        return "application/x-empty".to_string();
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    let sample = &data[..data.len().min(SNIFF_LEN)];
    if looks_like_text(sample) {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

fn looks_like_text(sample: &[u8]) -> bool {
    if sample.contains(&0) {
        return false;
    }
    // A trailing multi-byte sequence may be cut off by the sample boundary;
    // only the complete prefix needs to decode.
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && e.valid_up_to() > 0,
    }
}

/// Derive the filename's extension: lower-cased, including the leading dot,
/// empty when the filename has no suffix.
pub fn file_extension(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    match name.rfind('.') {
        // A leading dot marks a hidden file, not an extension.
        Some(0) | None => String::new(),
        Some(i) => name[i..].to_lowercase(),
    }
}
