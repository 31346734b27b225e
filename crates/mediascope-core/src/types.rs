use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MediaError;

// =============================================================================
// Media classes
// =============================================================================

/// The kind of media an embedding was extracted from.
///
/// Each class has its own table and its own fixed vector dimensionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaClass {
    Image = 0,
    Audio = 1,
}

/// Constants attached to a [`MediaClass`].
#[derive(Debug)]
pub struct MediaClassInfo {
    /// Wire and log name.
    pub name: &'static str,
    /// SQL table holding vectors of this class.
    pub table: &'static str,
    /// Dimensionality used when configuration does not override it.
    pub default_dimensions: usize,
    /// MIME type prefix recognised for uploads.
    pub mime_prefix: &'static str,
    /// Lower-case file extensions recognised for uploads.
    pub extensions: &'static [&'static str],
}

/// Indexed by `MediaClass as usize`.
const CLASS_TABLE: [MediaClassInfo; 2] = [
    MediaClassInfo {
        name: "image",
        table: "images",
        default_dimensions: 1568,
        mime_prefix: "image/",
        extensions: &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".bmp", ".tiff"],
    },
    MediaClassInfo {
        name: "audio",
        table: "audio",
        default_dimensions: 768,
        mime_prefix: "audio/",
        extensions: &[".mp3", ".wav", ".ogg", ".m4a", ".flac", ".aac"],
    },
];

impl MediaClass {
    pub const ALL: [MediaClass; 2] = [MediaClass::Image, MediaClass::Audio];

    pub fn info(self) -> &'static MediaClassInfo {
        &CLASS_TABLE[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    pub fn table_name(self) -> &'static str {
        self.info().table
    }

    pub fn default_dimensions(self) -> usize {
        self.info().default_dimensions
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaClass {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MediaClass::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MediaError::UnsupportedMediaType(s.to_string()))
    }
}

/// Per-class vector dimensionality for one deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorDimensions {
    pub image: usize,
    pub audio: usize,
}

impl VectorDimensions {
    pub fn new(image: usize, audio: usize) -> Self {
        Self { image, audio }
    }

    pub fn get(&self, class: MediaClass) -> usize {
        match class {
            MediaClass::Image => self.image,
            MediaClass::Audio => self.audio,
        }
    }
}

impl Default for VectorDimensions {
    fn default() -> Self {
        Self {
            image: MediaClass::Image.default_dimensions(),
            audio: MediaClass::Audio.default_dimensions(),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A persisted embedding. At most one exists per (class, page URL).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub page_url: String,
    pub media_class: MediaClass,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// One media item discovered by the crawler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedItem {
    pub page_url: String,
    pub media_url: String,
    #[serde(rename = "media_type")]
    pub media_class: MediaClass,
}

impl ScrapedItem {
    pub fn new(
        page_url: impl Into<String>,
        media_url: impl Into<String>,
        media_class: MediaClass,
    ) -> Self {
        Self {
            page_url: page_url.into(),
            media_url: media_url.into(),
            media_class,
        }
    }
}

/// Aggregate counts for one ingested batch.
///
/// Duplicates are neither processed nor failed, so
/// `items_processed + items_failed + items_skipped == items_received`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub items_received: usize,
    pub items_processed: usize,
    pub items_failed: usize,
    pub items_skipped: usize,
}

/// One ranked hit from a similarity query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub page_url: String,
    pub similarity: f64,
    #[serde(rename = "media_type")]
    pub media_class: MediaClass,
}

/// Result of a conditional insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// A record for the key already existed; nothing was written.
    AlreadyPresent,
}

/// Where query or index media comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaInput {
    /// The extraction service downloads the media itself.
    Url(String),
    /// Raw bytes uploaded by the caller.
    Bytes { filename: String, data: Vec<u8> },
}

impl MediaInput {
    /// Short label for logs; never the payload.
    pub fn describe(&self) -> String {
        match self {
            MediaInput::Url(url) => url.clone(),
            MediaInput::Bytes { filename, data } => format!("{} ({} bytes)", filename, data.len()),
        }
    }
}

// =============================================================================
// Scraping
// =============================================================================

/// A crawl job request forwarded to the scraper service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default)]
    pub allowed_domains: String,
    #[serde(default)]
    pub depth_limit: i32,
    #[serde(default)]
    pub crawl_strategy: String,
    #[serde(default)]
    pub use_playwright: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Accepted,
    Rejected,
}

/// Scraper reply. `Rejected` is a normal outcome, not a failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub job_id: String,
    pub status: ScrapeStatus,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_table_lookup() {
        assert_eq!(MediaClass::Image.table_name(), "images");
        assert_eq!(MediaClass::Audio.table_name(), "audio");
        assert_eq!(MediaClass::Image.default_dimensions(), 1568);
        assert_eq!(MediaClass::Audio.default_dimensions(), 768);
        for class in MediaClass::ALL {
            assert_eq!(class.info().name, class.as_str());
        }
    }

    #[test]
    fn test_class_from_str() {
        assert_eq!("image".parse::<MediaClass>().unwrap(), MediaClass::Image);
        assert_eq!("AUDIO".parse::<MediaClass>().unwrap(), MediaClass::Audio);
        assert_eq!(" Audio ".parse::<MediaClass>().unwrap(), MediaClass::Audio);

        let err = "video".parse::<MediaClass>().unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_class_serde_names() {
        assert_eq!(serde_json::to_string(&MediaClass::Image).unwrap(), "\"image\"");
        let class: MediaClass = serde_json::from_str("\"audio\"").unwrap();
        assert_eq!(class, MediaClass::Audio);
    }

    #[test]
    fn test_default_dimensions_follow_table() {
        let dims = VectorDimensions::default();
        assert_eq!(dims.get(MediaClass::Image), 1568);
        assert_eq!(dims.get(MediaClass::Audio), 768);

        let dims = VectorDimensions::new(4, 3);
        assert_eq!(dims.get(MediaClass::Image), 4);
        assert_eq!(dims.get(MediaClass::Audio), 3);
    }

    #[test]
    fn test_scraped_item_wire_format() {
        let json = r#"{"page_url":"https://a.test/p","media_url":"https://a.test/x.png","media_type":"image"}"#;
        let item: ScrapedItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.media_class, MediaClass::Image);
        assert_eq!(item.page_url, "https://a.test/p");
    }

    #[test]
    fn test_search_result_serializes_media_type() {
        let hit = SearchResult {
            page_url: "https://a.test".to_string(),
            similarity: 0.5,
            media_class: MediaClass::Audio,
        };
        let value = serde_json::to_value(&hit).unwrap();
        assert_eq!(value["media_type"], "audio");
    }

    #[test]
    fn test_scrape_request_defaults() {
        let req: ScrapeRequest = serde_json::from_str(r#"{"url":"https://a.test"}"#).unwrap();
        assert_eq!(req.depth_limit, 0);
        assert!(req.crawl_strategy.is_empty());
        assert!(!req.use_playwright);
    }

    #[test]
    fn test_media_input_describe_hides_payload() {
        let input = MediaInput::Bytes {
            filename: "cat.png".to_string(),
            data: vec![1, 2, 3],
        };
        assert_eq!(input.describe(), "cat.png (3 bytes)");
    }
}
