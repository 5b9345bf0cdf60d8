use std::path::Path;
use std::process::Stdio;

use anyhow::anyhow;

pub async fn is_ffprobe_available() -> bool {
    tokio::process::Command::new("ffprobe")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Delivered height of the first video stream in a local file.
pub async fn video_height(path: &Path) -> anyhow::Result<u32> {
    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=height",
            "-of",
            "json",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("failed to run ffprobe: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe failed: {}", stderr.trim()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("ffprobe returned invalid JSON: {}", e))?;

    parse_height(&json)
}

fn parse_height(json: &serde_json::Value) -> anyhow::Result<u32> {
    json.get("streams")
        .and_then(|v| v.as_array())
        .and_then(|streams| streams.first())
        .and_then(|s| s.get("height"))
        .and_then(|h| h.as_u64())
        .map(|h| h as u32)
        .ok_or_else(|| anyhow!("no video stream height in ffprobe output"))
}
