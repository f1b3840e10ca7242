//! Storage-class routing: which backend bucket an object belongs to.

use serde::{Deserialize, Serialize};

/// Physical namespace an assembled object is routed to.
///
/// Media files are served through the CDN-facing media bucket; everything
/// else lands in the generic document bucket. Selection is a pure function
/// of the declared content type, decided once at initiation and recorded on
/// the session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StorageClass {
    Media,
    Documents,
}

impl StorageClass {
    /// Classify a MIME type into a backend bucket.
    pub fn from_content_type(content_type: &str) -> Self {
        match category(content_type).as_str() {
            "video" | "image" | "audio" => StorageClass::Media,
            _ => StorageClass::Documents,
        }
    }

    /// Whether a MIME type describes a video. Shares the parse with
    /// [`StorageClass::from_content_type`], so the two checks always agree.
    pub fn is_video(content_type: &str) -> bool {
        category(content_type) == "video"
    }

    /// Bucket name within the backend root.
    pub fn bucket(&self) -> &'static str {
        match self {
            StorageClass::Media => "media",
            StorageClass::Documents => "documents",
        }
    }
}

/// Top-level MIME category, trimmed and lowercased.
fn category(content_type: &str) -> String {
    content_type
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_types_route_to_media_bucket() {
        assert_eq!(
            StorageClass::from_content_type("video/mp4"),
            StorageClass::Media
        );
        assert_eq!(
            StorageClass::from_content_type("image/png"),
            StorageClass::Media
        );
        assert_eq!(
            StorageClass::from_content_type("audio/mpeg"),
            StorageClass::Media
        );
        assert_eq!(
            StorageClass::from_content_type("VIDEO/QuickTime"),
            StorageClass::Media
        );
    }

    #[test]
    fn everything_else_routes_to_documents() {
        assert_eq!(
            StorageClass::from_content_type("application/pdf"),
            StorageClass::Documents
        );
        assert_eq!(
            StorageClass::from_content_type("text/plain"),
            StorageClass::Documents
        );
        assert_eq!(
            StorageClass::from_content_type(""),
            StorageClass::Documents
        );
        assert_eq!(
            StorageClass::from_content_type("videogame"),
            StorageClass::Documents
        );
    }

    #[test]
    fn video_detection_matches_bucket_routing() {
        assert!(StorageClass::is_video("video/mp4"));
        assert!(StorageClass::is_video("Video/MP4"));
        assert!(StorageClass::is_video("VIDEO/QuickTime"));
        assert!(!StorageClass::is_video("image/png"));
        assert!(!StorageClass::is_video("videogame"));
        assert!(!StorageClass::is_video(""));
    }
}
