use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::{ffprobe, ytdlp};
use crate::models::settings::DownloadSettings;

/// External transfer collaborator. Takes a target URL, delivers a finished
/// artifact under the configured output directory, enforcing the
/// `height >= min_height` format filter and reporting chunk progress.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        min_height: u32,
        progress: mpsc::Sender<ytdlp::ProgressUpdate>,
    ) -> anyhow::Result<PathBuf>;
}

/// Local media-inspection collaborator for the post-download quality check.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    async fn video_height(&self, path: &Path) -> anyhow::Result<u32>;
}

pub struct YtdlpEngine {
    ytdlp: PathBuf,
    settings: DownloadSettings,
}

impl YtdlpEngine {
    pub fn new(ytdlp: PathBuf, settings: DownloadSettings) -> Self {
        Self { ytdlp, settings }
    }
}

#[async_trait]
impl DownloadEngine for YtdlpEngine {
    async fn fetch(
        &self,
        url: &str,
        min_height: u32,
        progress: mpsc::Sender<ytdlp::ProgressUpdate>,
    ) -> anyhow::Result<PathBuf> {
        ytdlp::download(
            &self.ytdlp,
            url,
            &self.settings.output_dir,
            min_height,
            self.settings.concurrent_fragments,
            progress,
        )
        .await
    }
}

pub struct FfprobeInspector;

#[async_trait]
impl MediaInspector for FfprobeInspector {
    async fn video_height(&self, path: &Path) -> anyhow::Result<u32> {
        ffprobe::video_height(path).await
    }
}
