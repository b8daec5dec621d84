//! Video platform port: metadata listing and audio download.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use vlore_models::{CreatorHandle, VideoMeta};

use crate::error::PortResult;

/// Access to the upstream video platform.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// List a creator's videos, newest first.
    async fn list_videos(&self, creator: &CreatorHandle) -> PortResult<Vec<VideoMeta>>;

    /// Download the audio track of a video to `destination`.
    ///
    /// Returns the path of the written audio file. `auth_cookies` is an
    /// optional cookies file for age- or login-gated content.
    async fn download_audio(
        &self,
        video_url: &str,
        destination: &Path,
        auth_cookies: Option<&Path>,
    ) -> PortResult<PathBuf>;
}
