//! Video metadata as listed by the platform port.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::VideoId;

/// One video as returned by the platform's metadata listing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoMeta {
    /// Platform video ID
    pub id: VideoId,
    /// Video title
    pub title: String,
    /// Canonical video URL
    pub url: String,
    /// Duration in seconds, when the platform reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    /// Upload date, when the platform reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<DateTime<Utc>>,
    /// Hashtags attached to the post
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl VideoMeta {
    pub fn new(id: impl Into<VideoId>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            duration_sec: None,
            upload_date: None,
            hashtags: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration_sec: f64) -> Self {
        self.duration_sec = Some(duration_sec);
        self
    }

    pub fn with_upload_date(mut self, upload_date: DateTime<Utc>) -> Self {
        self.upload_date = Some(upload_date);
        self
    }
}
