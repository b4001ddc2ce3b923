//! Attachment types and media-type classification tables.

use serde::{Deserialize, Serialize};

/// Scheme prefix for object-storage URLs that require presigning.
pub const STORAGE_SCHEME: &str = "s3://";

/// An attachment reference supplied with an inbound turn (camelCase wire
/// shape, matching the chat request body).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl AttachmentInput {
    /// Display name used in error reporting: the explicit name when present,
    /// otherwise the trailing path segment of the URL.
    pub fn display_name(&self) -> &str {
        if let Some(name) = &self.name {
            return name;
        }
        self.url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.url)
    }

    pub fn needs_signing(&self) -> bool {
        self.url.starts_with(STORAGE_SCHEME)
    }
}

/// Outcome of resolving one attachment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAttachment {
    pub original_url: String,
    /// Fetchable HTTP URL. `None` when resolution failed.
    pub resolved_url: Option<String>,
    pub name: String,
    pub media_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub valid: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Media-type classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extension → media type for the formats the normalizer understands.
const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
];

/// Lowercased extension of a filename, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Media type inferred from a filename extension.
pub fn media_type_for_filename(name: &str) -> Option<&'static str> {
    let ext = extension_of(name)?;
    EXTENSION_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mt)| *mt)
}

pub fn is_image_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

pub fn is_image_filename(name: &str) -> bool {
    media_type_for_filename(name).is_some_and(is_image_media_type)
}

/// Binary document formats that get a placeholder note instead of inlined
/// content (the model cannot read them as text).
pub fn is_binary_document(media_type: &str) -> bool {
    matches!(
        media_type,
        "application/pdf"
            | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-powerpoint"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
    )
}

/// Content a fetch can inline as plain text.
pub fn is_textual_media_type(media_type: &str) -> bool {
    media_type.starts_with("text/")
        || media_type == "application/json"
        || media_type.ends_with("+json")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup() {
        assert_eq!(media_type_for_filename("cat.png"), Some("image/png"));
        assert_eq!(media_type_for_filename("CAT.PNG"), Some("image/png"));
        assert_eq!(
            media_type_for_filename("report.pdf"),
            Some("application/pdf")
        );
        assert_eq!(media_type_for_filename("noext"), None);
        assert_eq!(media_type_for_filename("archive.zip"), None);
    }

    #[test]
    fn image_classification() {
        assert!(is_image_filename("photo.jpeg"));
        assert!(!is_image_filename("notes.txt"));
        assert!(is_image_media_type("image/webp"));
        assert!(!is_image_media_type("application/pdf"));
    }

    #[test]
    fn binary_documents() {
        assert!(is_binary_document("application/pdf"));
        assert!(is_binary_document(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!is_binary_document("text/plain"));
    }

    #[test]
    fn textual_media_types() {
        assert!(is_textual_media_type("text/plain"));
        assert!(is_textual_media_type("application/json"));
        assert!(is_textual_media_type("application/ld+json"));
        assert!(!is_textual_media_type("application/octet-stream"));
    }

    #[test]
    fn display_name_falls_back_to_url_segment() {
        let a = AttachmentInput {
            url: "s3://bucket/uploads/a.pdf".into(),
            name: None,
            media_type: None,
            size_bytes: None,
        };
        assert_eq!(a.display_name(), "a.pdf");

        let b = AttachmentInput {
            url: "s3://bucket/uploads/a.pdf".into(),
            name: Some("quarterly report.pdf".into()),
            media_type: None,
            size_bytes: None,
        };
        assert_eq!(b.display_name(), "quarterly report.pdf");
    }

    #[test]
    fn storage_scheme_detection() {
        let a = AttachmentInput {
            url: "s3://bucket/key".into(),
            name: None,
            media_type: None,
            size_bytes: None,
        };
        assert!(a.needs_signing());
        let b = AttachmentInput {
            url: "https://cdn.example.com/x".into(),
            name: None,
            media_type: None,
            size_bytes: None,
        };
        assert!(!b.needs_signing());
    }
}
