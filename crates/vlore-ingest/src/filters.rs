//! Metadata filters applied to a creator's video listing before any
//! download happens. Listings arrive newest first.

use vlore_models::{IngestFilters, IngestSettings, VideoMeta};

/// Result of filtering a listing: what to process and how many were
/// dropped by the duration hard-skip.
#[derive(Debug)]
pub struct FilteredListing {
    pub videos: Vec<VideoMeta>,
    pub duration_skipped: usize,
}

/// Apply the positional, date and duration filters.
///
/// `required_tags` and the speech filters are post-filters applied
/// after transcription/extraction, never here.
pub fn apply_filters(
    mut videos: Vec<VideoMeta>,
    filters: &IngestFilters,
    settings: &IngestSettings,
) -> FilteredListing {
    if let Some(n) = filters.last_n_videos {
        videos.truncate(n);
    }

    if filters.history_start.is_some() || filters.history_end.is_some() {
        let len = videos.len();
        let start = filters.history_start.unwrap_or(0.0).clamp(0.0, 1.0);
        let end = filters.history_end.unwrap_or(1.0).clamp(0.0, 1.0);
        let from = (start * len as f64).floor() as usize;
        let to = ((end * len as f64).ceil() as usize).min(len);
        videos = if from < to {
            videos[from..to].to_vec()
        } else {
            Vec::new()
        };
    }

    if let Some(from) = filters.date_from {
        videos.retain(|v| v.upload_date.map(|d| d >= from).unwrap_or(true));
    }
    if let Some(to) = filters.date_to {
        videos.retain(|v| v.upload_date.map(|d| d <= to).unwrap_or(true));
    }

    let mut duration_skipped = 0usize;
    if let Some(max_minutes) = settings.max_duration_minutes {
        let max_secs = max_minutes * 60.0;
        let before = videos.len();
        videos.retain(|v| v.duration_sec.map(|d| d <= max_secs).unwrap_or(true));
        duration_skipped = before - videos.len();
    }

    FilteredListing {
        videos,
        duration_skipped,
    }
}
