use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub name: String,
    pub percent: f64,
    pub speed: String,
    pub eta: String,
}

pub async fn find_ytdlp() -> Option<PathBuf> {
    let bin_name = if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    };

    if let Ok(status) = tokio::process::Command::new(bin_name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        if status.success() {
            return Some(PathBuf::from(bin_name));
        }
    }

    let managed = dirs::data_dir()?
        .join("streamgrab")
        .join("bin")
        .join(bin_name);
    if managed.exists() {
        return Some(managed);
    }

    None
}

/// Metadata dump for a candidate URL. `impersonate` adds the generic
/// extractor's browser-impersonation hint; some Cloudflare-fronted hosts only
/// answer with it, a few older ones only without.
pub async fn inspect_url(
    ytdlp: &Path,
    url: &str,
    impersonate: bool,
) -> anyhow::Result<serde_json::Value> {
    let mut args = vec!["--dump-json", "--no-warnings", "--no-playlist"];
    if impersonate {
        args.push("--extractor-args");
        args.push("generic:impersonate");
    }
    args.push(url);

    let output = tokio::process::Command::new(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("failed to run yt-dlp: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("yt-dlp failed: {}", stderr.trim()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("yt-dlp returned invalid JSON: {}", e))?;

    Ok(json)
}

/// Maximum height across the dumped formats, 0 when nothing declares one.
pub fn best_height(json: &serde_json::Value) -> u32 {
    let from_formats = json
        .get("formats")
        .and_then(|v| v.as_array())
        .map(|formats| {
            formats
                .iter()
                .filter_map(|f| f.get("height").and_then(|v| v.as_u64()))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    if from_formats > 0 {
        return from_formats as u32;
    }

    json.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32
}

/// Declared size of the representative (tallest) format, falling back to the
/// top-level filesize fields.
pub fn declared_size(json: &serde_json::Value) -> Option<u64> {
    let size_of = |v: &serde_json::Value| {
        v.get("filesize")
            .or_else(|| v.get("filesize_approx"))
            .and_then(|s| s.as_u64())
    };

    if let Some(formats) = json.get("formats").and_then(|v| v.as_array()) {
        let tallest = formats
            .iter()
            .max_by_key(|f| f.get("height").and_then(|v| v.as_u64()).unwrap_or(0));
        if let Some(size) = tallest.and_then(size_of) {
            return Some(size);
        }
    }

    size_of(json)
}

fn format_selector(min_height: u32) -> String {
    if min_height > 0 {
        format!(
            "bv*[height>={h}]+ba/b[height>={h}]/bv*+ba/b",
            h = min_height
        )
    } else {
        "bv*+ba/b".to_string()
    }
}

pub async fn download(
    ytdlp: &Path,
    url: &str,
    output_dir: &Path,
    min_height: u32,
    concurrent_fragments: u32,
    progress: mpsc::Sender<ProgressUpdate>,
) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let started = std::time::SystemTime::now();

    let output_template = output_dir
        .join("%(title).200s.%(ext)s")
        .to_string_lossy()
        .to_string();

    let args = vec![
        "-f".to_string(),
        format_selector(min_height),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "--concurrent-fragments".to_string(),
        concurrent_fragments.to_string(),
        "--extractor-args".to_string(),
        "generic:impersonate".to_string(),
        "--progress-template".to_string(),
        "download:%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(info.title)s"
            .to_string(),
        "--no-simulate".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
        "-o".to_string(),
        output_template,
        url.to_string(),
    ];

    let mut child = tokio::process::Command::new(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("failed to start yt-dlp: {}", e))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
    let reader = BufReader::new(stdout);
    let mut lines = reader.lines();

    let progress_tx = progress.clone();
    let line_reader = tokio::spawn(async move {
        let mut printed_path: Option<PathBuf> = None;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(update) = parse_progress_line(&line) {
                let _ = progress_tx.send(update).await;
            } else if !line.trim().is_empty() {
                // The only bare line yt-dlp prints here is the final path.
                printed_path = Some(PathBuf::from(line.trim()));
            }
        }
        printed_path
    });

    let status = child
        .wait()
        .await
        .map_err(|e| anyhow!("yt-dlp process failed: {}", e))?;

    let printed_path = line_reader.await.ok().flatten();

    if !status.success() {
        return Err(anyhow!("yt-dlp exited with {}", status));
    }

    if let Some(path) = printed_path {
        if path.is_file() {
            return Ok(path);
        }
    }

    newest_media_file(output_dir, started).await
}

fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let rest = line.trim().strip_prefix("download:")?;
    let mut parts = rest.splitn(4, '|');
    let percent = parts
        .next()?
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()?;
    let speed = parts.next().unwrap_or("").trim().to_string();
    let eta = parts.next().unwrap_or("").trim().to_string();
    let name = parts.next().unwrap_or("").trim().to_string();
    Some(ProgressUpdate {
        name,
        percent,
        speed,
        eta,
    })
}

/// Fallback when yt-dlp did not print the final path: newest complete file
/// written to the output directory since the download started.
async fn newest_media_file(
    output_dir: &Path,
    started: std::time::SystemTime,
) -> anyhow::Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with(".part") || name.ends_with(".ytdl") || name.starts_with('.') {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified < started {
            continue;
        }
        match &best {
            Some((_, best_time)) if modified <= *best_time => {}
            _ => best = Some((path, modified)),
        }
    }

    best.map(|(p, _)| p)
        .ok_or_else(|| anyhow!("downloaded file not found in {:?}", output_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_line_carries_all_fields() {
        let update =
            parse_progress_line("download:  42.5%|2.10MiB/s|00:31|Some Title").unwrap();
        assert_eq!(update.percent, 42.5);
        assert_eq!(update.speed, "2.10MiB/s");
        assert_eq!(update.eta, "00:31");
        assert_eq!(update.name, "Some Title");
    }

    #[test]
    fn non_progress_lines_are_ignored() {
        assert!(parse_progress_line("/downloads/final.mp4").is_none());
        assert!(parse_progress_line("").is_none());
        assert!(parse_progress_line("download:garbage|x|y|z").is_none());
    }

    #[test]
    fn best_height_prefers_format_list() {
        let info = json!({
            "height": 480,
            "formats": [
                {"format_id": "a", "height": 720},
                {"format_id": "b", "height": 1080},
                {"format_id": "c"},
            ],
        });
        assert_eq!(best_height(&info), 1080);
    }

    #[test]
    fn best_height_falls_back_to_top_level() {
        assert_eq!(best_height(&json!({"height": 720})), 720);
        assert_eq!(best_height(&json!({"title": "x"})), 0);
    }

    #[test]
    fn declared_size_tracks_the_tallest_format() {
        let info = json!({
            "filesize_approx": 1,
            "formats": [
                {"height": 720, "filesize": 100},
                {"height": 1080, "filesize_approx": 900},
            ],
        });
        assert_eq!(declared_size(&info), Some(900));
    }

    #[test]
    fn declared_size_falls_back_to_top_level() {
        assert_eq!(declared_size(&json!({"filesize": 5})), Some(5));
        assert_eq!(declared_size(&json!({})), None);
    }

    #[test]
    fn format_selector_carries_the_floor() {
        assert_eq!(
            format_selector(720),
            "bv*[height>=720]+ba/b[height>=720]/bv*+ba/b"
        );
        assert_eq!(format_selector(0), "bv*+ba/b");
    }
}
