use std::path::Path;

use anyhow::{anyhow, Context};
use tokio_util::io::ReaderStream;

use crate::models::settings::UploadSettings;
use crate::ui::Presenter;

const DAV_ROOT: &str = "https://app.koofr.net/dav";

/// PUT a finished artifact into the configured WebDAV folder. The body is
/// streamed straight from disk, so multi-gigabyte files never sit in memory.
pub async fn upload_file(
    client: &reqwest::Client,
    settings: &UploadSettings,
    path: &Path,
    ui: &dyn Presenter,
) -> anyhow::Result<()> {
    let (Some(user), Some(password)) = (settings.user.as_deref(), settings.password.as_deref())
    else {
        return Err(anyhow!("upload credentials are not configured"));
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("artifact has no usable file name: {}", path.display()))?;
    let remote_name = sanitize_filename::sanitize(file_name);
    let url = remote_url(&settings.base_path, &remote_name);

    ui.log(&format!("Uploading {} -> {}", path.display(), url));

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let size = file.metadata().await.ok().map(|m| m.len());

    let mut request = client
        .put(&url)
        .basic_auth(user, Some(password))
        .body(reqwest::Body::wrap_stream(ReaderStream::new(file)));
    if let Some(size) = size {
        request = request.header(reqwest::header::CONTENT_LENGTH, size);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("upload request to {} failed", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("upload of {} rejected: HTTP {}", remote_name, status));
    }

    ui.log(&format!("Uploaded {}", remote_name));
    Ok(())
}

fn remote_url(base_path: &str, file_name: &str) -> String {
    let base = base_path.trim_matches('/');
    let encoded: Vec<String> = base
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect();
    let mut url = String::from(DAV_ROOT);
    for segment in encoded {
        url.push('/');
        url.push_str(&segment);
    }
    url.push('/');
    url.push_str(&urlencoding::encode(file_name));
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_url_encodes_each_segment() {
        assert_eq!(
            remote_url("Media/Shows", "episode 01.mp4"),
            "https://app.koofr.net/dav/Media/Shows/episode%2001.mp4"
        );
    }

    #[test]
    fn remote_url_tolerates_sloppy_base_paths() {
        assert_eq!(
            remote_url("/backup//video/", "a.mkv"),
            "https://app.koofr.net/dav/backup/video/a.mkv"
        );
        assert_eq!(remote_url("", "a.mkv"), "https://app.koofr.net/dav/a.mkv");
    }
}
