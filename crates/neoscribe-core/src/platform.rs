//! Host platform services: scratch storage, document picker, sharing and
//! preference persistence.
//!
//! ## Learning: Small Traits, Swappable Hosts
//!
//! Each service is its own trait so a host only implements what it has,
//! and tests swap in the recorders from `headless`. Cancellation is not an
//! error: pickers return `Ok(None)`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::Preferences;

/// A file created in scratch storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchFile {
    pub path: PathBuf,
    /// Persistent handle, if the storage has one
    pub uri: Option<String>,
    pub name: String,
}

/// A document chosen through the picker, copied to a local path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub uri: Option<String>,
}

/// Errors from platform services.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{0} looks like a binary file")]
    BinaryContent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

pub trait ScratchStorage: Send {
    /// Writes `contents` to a new scratch file named after `name`.
    fn create_temp_file(&mut self, name: &str, contents: &str) -> Result<ScratchFile, PlatformError>;
}

pub trait FilePicker: Send {
    /// Lets the user choose a document to open.
    fn pick_document(&mut self) -> Result<Option<PickedFile>, PlatformError>;

    /// Lets the user choose where to create a document. Returns its handle.
    fn create_document(&mut self, name: &str, mime: &str) -> Result<Option<String>, PlatformError>;
}

pub trait SharePlatform: Send {
    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), PlatformError>;
    fn share_text(&mut self, text: &str) -> Result<(), PlatformError>;
    fn share_file(&mut self, file: &ScratchFile) -> Result<(), PlatformError>;
}

pub trait PreferenceStore: Send {
    fn load(&mut self) -> Result<Option<Preferences>, PlatformError>;
    fn save(&mut self, preferences: &Preferences) -> Result<(), PlatformError>;
}

/// MIME type used when creating a document with the given extension.
///
/// Unknown extensions get `*/*` so the platform keeps the file name as is.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "html" => "text/html",
        "md" => "text/markdown",
        "json" => "application/json",
        "js" => "application/javascript",
        _ => "*/*",
    }
}

/// Bytes inspected by `sniff_binary`.
pub const SNIFF_LEN: usize = 1024;

const SIGNATURES: &[(&[u8], usize, &str)] = &[
    (b"%PDF", 0, "PDF document"),
    (&[0x50, 0x4B, 0x03, 0x04], 0, "ZIP / Office document"),
    (&[0x50, 0x4B, 0x05, 0x06], 0, "ZIP archive"),
    (&[0xFF, 0xD8, 0xFF], 0, "JPEG image"),
    (&[0x89, 0x50, 0x4E, 0x47], 0, "PNG image"),
    (b"GIF8", 0, "GIF image"),
    (b"BM", 0, "BMP image"),
    (b"MZ", 0, "Windows executable"),
    (&[0x7F, 0x45, 0x4C, 0x46], 0, "ELF binary"),
    (&[0xCA, 0xFE, 0xBA, 0xBE], 0, "Java class file"),
    (&[0xCE, 0xFA, 0xED, 0xFE], 0, "Mach-O binary"),
    (&[0x1F, 0x8B], 0, "GZIP archive"),
    (b"BZh", 0, "BZIP2 archive"),
    (b"Rar!", 0, "RAR archive"),
    (&[0x37, 0x7A, 0xBC, 0xAF], 0, "7-Zip archive"),
    (&[0xD0, 0xCF, 0x11, 0xE0], 0, "legacy Office document"),
    (b"SQLit", 0, "SQLite database"),
    (b"OggS", 0, "OGG media"),
    (b"ID3", 0, "MP3 audio"),
    (b"ftyp", 4, "MP4/MOV video"),
    (b"RIFF", 0, "WAV/AVI/WebP media"),
];

/// Describes `header` if it looks like binary content.
///
/// Known magic numbers are checked first. Otherwise the header is binary
/// when more than 15% of its bytes are control characters other than tab,
/// CR and LF. Bytes >= 0x80 count as text (multi-byte UTF-8).
pub fn sniff_binary(header: &[u8]) -> Option<String> {
    let header = &header[..header.len().min(SNIFF_LEN)];
    if header.is_empty() {
        return None;
    }

    for (magic, offset, description) in SIGNATURES {
        if header.get(*offset..offset + magic.len()) == Some(*magic) {
            return Some((*description).to_string());
        }
    }

    let non_text = header
        .iter()
        .filter(|&&b| !matches!(b, 0x09 | 0x0A | 0x0D | 0x20..=0x7E | 0x80..=0xFF))
        .count();
    let ratio = non_text as f64 / header.len() as f64;
    if ratio > 0.15 {
        Some(format!("binary data ({:.0}% non-text bytes)", ratio * 100.0))
    } else {
        None
    }
}
