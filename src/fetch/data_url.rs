//! RFC 2397 `data:` URL decoding
//!
//! `data:[<mediatype>][;name=<name>][;base64],<payload>`
//!
//! The header ends at the first comma. A `;base64` marker as the last header
//! parameter selects base64 decoding for the payload, otherwise the payload is
//! percent-decoded as-is.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use super::types::FetchError;

/// Media type assumed when the header does not declare one
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain;charset=US-ASCII";

/// Padding is optional in the wild (blob conversions, hand-built URLs)
const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// A decoded data URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Declared media type, including parameters such as charset
    pub media_type: String,
    /// Optional `name=` parameter
    pub name: Option<String>,
    /// Whether the payload was base64 encoded
    pub base64: bool,
    /// Decoded payload
    pub bytes: Vec<u8>,
}

/// Parse and decode a `data:` URL
pub fn parse(raw: &str) -> Result<DataUrl, FetchError> {
    let raw = raw.trim();
    let rest = strip_prefix_ignore_case(raw, "data:")
        .ok_or_else(|| FetchError::MalformedDataUrl("missing data: prefix".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::MalformedDataUrl("missing ',' separator".to_string()))?;

    let mut params: Vec<&str> = header.split(';').map(str::trim).collect();

    let base64 = params
        .last()
        .map(|p| p.eq_ignore_ascii_case("base64"))
        .unwrap_or(false);
    if base64 {
        params.pop();
    }

    // First segment is the mime type unless it is already a parameter
    let mut mime = String::new();
    if let Some(first) = params.first() {
        if !first.contains('=') {
            if !first.is_empty() && !is_mime_type(first) {
                return Err(FetchError::MalformedDataUrl(format!(
                    "invalid media type: {}",
                    first
                )));
            }
            mime = first.to_ascii_lowercase();
            params.remove(0);
        }
    }

    let mut name = None;
    let mut extra = Vec::new();
    for param in params.into_iter().filter(|p| !p.is_empty()) {
        let (key, value) = param.split_once('=').ok_or_else(|| {
            FetchError::MalformedDataUrl(format!("invalid header parameter: {}", param))
        })?;

        if key.trim().eq_ignore_ascii_case("name") {
            let decoded = urlencoding::decode(value.trim())
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.trim().to_string());
            name = Some(decoded);
        } else {
            extra.push(format!("{}={}", key.trim().to_ascii_lowercase(), value.trim()));
        }
    }

    let media_type = match (mime.is_empty(), extra.is_empty()) {
        (true, true) => DEFAULT_MEDIA_TYPE.to_string(),
        (true, false) => format!("text/plain;{}", extra.join(";")),
        (false, true) => mime,
        (false, false) => format!("{};{}", mime, extra.join(";")),
    };

    let bytes = if base64 {
        decode_base64(payload)?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok(DataUrl {
        media_type,
        name,
        base64,
        bytes,
    })
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, FetchError> {
    // Payloads copied out of HTML attributes may still be percent-encoded
    let unescaped = urlencoding::decode_binary(payload.as_bytes());
    let compact: Vec<u8> = unescaped
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    STANDARD_LENIENT
        .decode(&compact)
        .or_else(|_| URL_SAFE_LENIENT.decode(&compact))
        .map_err(|e| FetchError::MalformedDataUrl(format!("invalid base64 payload: {}", e)))
}

fn is_mime_type(value: &str) -> bool {
    match value.split_once('/') {
        Some((kind, sub)) => {
            !kind.is_empty()
                && !sub.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "/+-.!#$&^_".contains(c))
        }
        None => false,
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}
