//! Media class detection for uploads and requests.

use mediascope_core::error::{MediaError, Result};
use mediascope_core::types::MediaClass;

/// Classify media from its MIME type, falling back to the file extension.
pub fn classify(content_type: &str, filename: &str) -> Result<MediaClass> {
    let content_type = content_type.trim().to_ascii_lowercase();
    if let Some(class) = MediaClass::ALL
        .into_iter()
        .find(|class| content_type.starts_with(class.info().mime_prefix))
    {
        return Ok(class);
    }

    let filename = filename.to_ascii_lowercase();
    MediaClass::ALL
        .into_iter()
        .find(|class| {
            class
                .info()
                .extensions
                .iter()
                .any(|ext| filename.ends_with(ext))
        })
        .ok_or_else(|| {
            MediaError::UnsupportedMediaType(format!(
                "could not determine media type from Content-Type '{}' or filename '{}'",
                content_type, filename
            ))
        })
}

/// An explicit `media_type` wins; otherwise [`classify`].
pub fn resolve_class(
    explicit: Option<&str>,
    content_type: &str,
    filename: &str,
) -> Result<MediaClass> {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.parse(),
        None => classify(content_type, filename),
    }
}
