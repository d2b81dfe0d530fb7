/// Naming and validation policy shared by uploads and the document cache
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum accepted image upload (512 KiB)
pub const MAX_IMAGE_BYTES: u64 = 512 * 1024;

/// Maximum accepted document upload or download (20 MiB)
pub const MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Top-level directory under the storage root that holds every managed file
pub const UPLOADS_DIR: &str = "uploads";

/// Category used when a document category is blank
pub const DEFAULT_DOCUMENT_CATEGORY: &str = "documents";

/// Extension used when nothing better can be resolved
pub const GENERIC_EXTENSION: &str = ".bin";

/// Longest extension kept, leading dot included
const MAX_EXTENSION_LEN: usize = 10;

/// Hex characters kept from the SHA-256 cache digest (128 bits)
pub const DIGEST_HEX_LEN: usize = 32;

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".odt", ".ods", ".txt",
];

const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    ("application/msword", ".doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    ("application/vnd.ms-powerpoint", ".ppt"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".pptx",
    ),
    ("application/vnd.ms-excel", ".xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    ("application/vnd.oasis.opendocument.text", ".odt"),
    ("application/vnd.oasis.opendocument.spreadsheet", ".ods"),
    ("application/vnd.oasis.opendocument.presentation", ".odp"),
    ("application/rtf", ".rtf"),
    ("application/zip", ".zip"),
    ("application/json", ".json"),
    ("application/xml", ".xml"),
    ("text/plain", ".txt"),
    ("text/csv", ".csv"),
    ("text/html", ".html"),
    ("text/xml", ".xml"),
    ("image/png", ".png"),
    ("image/jpeg", ".jpg"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
];

/// Kind of upload, selecting the allow-list and byte ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Document,
}

impl UploadKind {
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Image => IMAGE_EXTENSIONS,
            UploadKind::Document => DOCUMENT_EXTENSIONS,
        }
    }

    pub fn allows(&self, extension: &str) -> bool {
        self.allowed_extensions().contains(&extension)
    }

    pub fn label(&self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Document => "document",
        }
    }
}

/// Root-relative path of a stored file: `uploads/<category>/<filename>`
///
/// Always forward-slash separated and never contains `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativeMediaPath(String);

impl RelativeMediaPath {
    /// Path of `filename` inside a sanitized category
    pub(crate) fn in_category(category: &str, filename: &str) -> Self {
        Self(format!("{}/{}/{}", UPLOADS_DIR, category, filename))
    }

    /// Wrap an already-resolved root-relative path
    pub(crate) fn from_resolved(path: String) -> Self {
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RelativeMediaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativeMediaPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sanitize a caller-supplied category token
///
/// Drops empty, `.` and `..` segments, removes any remaining `..` sequence and
/// normalizes separators to `/`. May return an empty string.
pub fn sanitize_category(category: &str) -> String {
    category
        .trim()
        .split(['/', '\\'])
        .map(|segment| segment.trim().replace("..", ""))
        .filter(|segment| !segment.is_empty() && segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Lowercased extension of a declared filename, with its leading dot
///
/// Returns `None` for names without a suffix, including dotfiles such as `.env`.
pub fn declared_extension(filename: &str) -> Option<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// Extension for a declared `Content-Type`, ignoring parameters
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }
    MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

/// Coerce an extension into `.[a-z0-9]+` of bounded length
///
/// Anything that does not fit becomes the generic extension.
pub fn sanitize_extension(extension: &str) -> String {
    let lowered = extension.trim().to_ascii_lowercase();
    let body = lowered.strip_prefix('.').unwrap_or(&lowered);
    if body.is_empty()
        || body.len() + 1 > MAX_EXTENSION_LEN
        || !body.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return GENERIC_EXTENSION.to_string();
    }
    format!(".{}", body)
}

/// Deterministic cache digest of a (URL, hint) pair
///
/// The two fields are joined by a NUL byte, which callers guarantee cannot
/// appear in either field.
pub fn cache_digest(url: &str, hint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update([0u8]);
    hasher.update(hint.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIGEST_HEX_LEN);
    digest
}

/// Random 128-bit file stem, hex encoded
pub fn random_file_stem() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
