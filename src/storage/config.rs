use std::path::{Path, PathBuf};

use crate::models::settings::AppSettings;

const SETTINGS_FILE: &str = "settings.json";

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("streamgrab").join(SETTINGS_FILE))
}

/// Settings from disk, with credentials from the environment layered on
/// top. A missing or unreadable file degrades to defaults.
pub fn load_settings() -> AppSettings {
    let mut settings = settings_path()
        .map(|path| load_from(&path))
        .unwrap_or_default();
    apply_env_overrides(&mut settings);
    settings
}

fn load_from(path: &Path) -> AppSettings {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("ignoring malformed {}: {}", path.display(), e);
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

/// Credentials never live in the settings file by requirement; they come in
/// through the environment at startup.
fn apply_env_overrides(settings: &mut AppSettings) {
    if let Ok(user) = std::env::var("KOOFR_USER") {
        settings.upload.user = Some(user);
    }
    if let Ok(password) = std::env::var("KOOFR_PASSWORD") {
        settings.upload.password = Some(password);
    }
    if let Ok(base) = std::env::var("KOOFR_BASE") {
        settings.upload.base_path = base;
    }
    if let Ok(server) = std::env::var("SURFSHARK_SERVER") {
        settings.vpn.server = Some(server);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn malformed_file_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{not json").unwrap();
        let settings = load_from(&path);
        assert_eq!(settings.download.min_height, 1080);
    }

    #[test]
    fn missing_file_degrades_to_defaults() {
        let settings = load_from(&PathBuf::from("/nonexistent/settings.json"));
        assert_eq!(settings.download.output_dir, PathBuf::from("downloads"));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut settings = AppSettings::default();
        settings.download.min_height = 720;
        settings.upload.base_path = "movies".to_string();
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.download.min_height, 720);
        assert_eq!(loaded.upload.base_path, "movies");
    }
}
