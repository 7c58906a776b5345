use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub struct MediaMetadata {
    pub title: String,
    pub id: String,
    pub format_ext: String,
    pub duration: Option<u64>,
    pub author: Option<String>,
}

impl MediaMetadata {
    /// Builds metadata from a yt-dlp info JSON object.
    ///
    /// Playlists resolve to their first entry, matching what gets downloaded.
    pub fn from_info_json(json: &Value) -> Self {
        let info = match json["entries"].as_array().and_then(|entries| entries.first()) {
            Some(first) if json["_type"].as_str() == Some("playlist") => first,
            _ => json,
        };

        Self {
            title: info["title"].as_str().unwrap_or("Video").to_string(),
            id: info["id"].as_str().unwrap_or("video").to_string(),
            format_ext: info["ext"].as_str().unwrap_or("mp4").to_string(),
            duration: info["duration"].as_f64().map(|d| d as u64),
            author: info["uploader"].as_str().map(|s| s.to_string()),
        }
    }
}

impl Default for MediaMetadata {
    fn default() -> Self {
        Self {
            title: "Video".to_string(),
            id: "video".to_string(),
            format_ext: "mp4".to_string(),
            duration: None,
            author: None,
        }
    }
}

/// Progress reported by a fetcher while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        downloaded_bytes: u64,
        /// Exact or estimated total; `None` when the source does not say.
        total_bytes: Option<u64>,
        /// Bytes per second.
        speed: Option<f64>,
    },
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_from_single_video() {
        let json = json!({
            "title": "A clip",
            "id": "abc123",
            "ext": "webm",
            "duration": 61.7,
            "uploader": "someone"
        });
        let metadata = MediaMetadata::from_info_json(&json);
        assert_eq!(metadata.title, "A clip");
        assert_eq!(metadata.id, "abc123");
        assert_eq!(metadata.format_ext, "webm");
        assert_eq!(metadata.duration, Some(61));
        assert_eq!(metadata.author.as_deref(), Some("someone"));
    }

    #[test]
    fn test_metadata_from_playlist_uses_first_entry() {
        let json = json!({
            "_type": "playlist",
            "title": "The playlist",
            "entries": [
                { "title": "First", "id": "one", "ext": "mp4" },
                { "title": "Second", "id": "two", "ext": "mp4" }
            ]
        });
        let metadata = MediaMetadata::from_info_json(&json);
        assert_eq!(metadata.title, "First");
        assert_eq!(metadata.id, "one");
    }

    #[test]
    fn test_metadata_defaults_for_missing_fields() {
        let metadata = MediaMetadata::from_info_json(&json!({}));
        assert_eq!(metadata, MediaMetadata::default());
    }
}
