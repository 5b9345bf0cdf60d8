use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub vpn: VpnSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Minimum acceptable stream height. The per-attempt effective minimum
    /// starts here and may only be relaxed downwards during resolution.
    #[serde(default = "default_min_height")]
    pub min_height: u32,
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            min_height: default_min_height(),
            concurrent_fragments: default_concurrent_fragments(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSettings {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub base_path: String,
}

impl UploadSettings {
    pub fn is_configured(&self) -> bool {
        self.user.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VpnSettings {
    #[serde(default)]
    pub server: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_min_height() -> u32 {
    1080
}

fn default_concurrent_fragments() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.download.min_height, 1080);
        assert_eq!(settings.download.output_dir, PathBuf::from("downloads"));
        assert!(!settings.upload.is_configured());
        assert!(settings.vpn.server.is_none());
    }

    #[test]
    fn upload_configured_requires_both_credentials() {
        let upload = UploadSettings {
            user: Some("me".into()),
            password: None,
            base_path: String::new(),
        };
        assert!(!upload.is_configured());

        let upload = UploadSettings {
            user: Some("me".into()),
            password: Some("secret".into()),
            base_path: "movies".into(),
        };
        assert!(upload.is_configured());
    }
}
