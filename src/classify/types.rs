//! Classification types

use serde::{Deserialize, Serialize};

use crate::fetch::{FetchedBlob, Scheme};

/// Document kind decided from content, not from the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    Pdf,
    OpaqueBinary,
}

impl DocumentKind {
    /// File extension used for cached copies of this kind
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::OpaqueBinary => "bin",
        }
    }

    /// Inverse of [`DocumentKind::extension`]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "bin" => Some(Self::OpaqueBinary),
            _ => None,
        }
    }
}

/// Why content did not match what the source promised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Diagnostic {
    /// No bytes at all
    Empty,
    /// An HTML/XML page where a binary document was expected (login walls, error pages)
    HtmlMasquerade,
    /// Fewer bytes than the source declared, or a cut-off signature
    Truncated,
    /// Bytes are not in any recognised format
    UnknownFormat,
}

impl Diagnostic {
    /// Stable identifier for bridge replies
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::HtmlMasquerade => "html_masquerade",
            Self::Truncated => "truncated",
            Self::UnknownFormat => "unknown_format",
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Empty => "The downloaded file is empty.",
            Self::HtmlMasquerade => {
                "The server returned a web page instead of the document. It likely requires authentication."
            }
            Self::Truncated => "The download was incomplete. Please try again.",
            Self::UnknownFormat => "The file is not a valid PDF.",
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of content classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub kind: DocumentKind,
    pub diagnostic: Option<Diagnostic>,
}

impl ClassificationResult {
    pub fn new(kind: DocumentKind, diagnostic: Option<Diagnostic>) -> Self {
        Self { kind, diagnostic }
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == DocumentKind::Pdf
    }

    /// Whether the pipeline may continue with this content
    ///
    /// A PDF with an advisory diagnostic is still accepted; it is the
    /// document backend's job to decide whether it can be opened.
    pub fn is_accepted(&self) -> bool {
        self.is_pdf() || self.diagnostic.is_none()
    }
}

// ============================================================================
// Extension Hint
// ============================================================================

/// What the source claims the document is, from its name or declared type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHint {
    file_name: Option<String>,
    extension: Option<String>,
}

impl ExtensionHint {
    /// A hint that claims nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// A bare extension hint, e.g. `"pdf"`
    pub fn from_extension(ext: &str) -> Self {
        Self {
            file_name: None,
            extension: normalize_extension(ext),
        }
    }

    /// Build a hint from, in order: the Content-Disposition filename, the URL
    /// (last path segment, or a file name passed as a query value), and the
    /// declared content type
    pub fn from_blob(blob: &FetchedBlob) -> Self {
        let file_name = blob
            .disposition_filename()
            .or_else(|| url_file_name(&blob.source_url));

        let extension = file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| normalize_extension(ext))
            .or_else(|| {
                blob.declared_content_type
                    .as_deref()
                    .and_then(extension_for_mime)
            });

        Self {
            file_name,
            extension,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// File name without its extension, if the source named the document
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.file_name.as_deref()?;
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        };
        Some(stem)
    }

    pub fn expects_pdf(&self) -> bool {
        self.extension.as_deref() == Some("pdf")
    }
}

fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

fn extension_for_mime(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/pdf" || essence == "application/x-pdf" {
        return Some("pdf".to_string());
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .and_then(|ext| normalize_extension(ext))
}

fn url_file_name(source_url: &str) -> Option<String> {
    if !matches!(
        Scheme::detect(source_url),
        Scheme::Http | Scheme::Https | Scheme::File
    ) {
        return None;
    }

    let url = reqwest::Url::parse(source_url).ok()?;
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .filter(|name| !name.is_empty());

    if segment.as_deref().map_or(false, has_file_extension) {
        return segment;
    }

    // Download endpoints like `/download?file=a.pdf`
    let from_query = url.query_pairs().find_map(|(_, value)| {
        let name = value.rsplit('/').next().unwrap_or_default().trim();
        has_file_extension(name).then(|| name.to_string())
    });

    from_query.or(segment)
}

fn has_file_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => normalize_extension(ext)
            .map_or(false, |ext| ext.chars().any(|c| c.is_ascii_alphabetic())),
        _ => false,
    }
}
