use std::path::Path;

use serde::Deserialize;

pub(crate) const CONFIG_FILE_NAME: &str = "koomind_config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_SOCKET_URL: &str = "ws://localhost:5000/ws";
const DEFAULT_RECONCILE_WINDOW_SECS: u64 = 120;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) api_base_url: Option<String>,
    pub(crate) socket_url: Option<String>,
    pub(crate) notification_sound: Option<bool>,
    pub(crate) desktop_notifications: Option<bool>,
    // How far apart (seconds) a broadcast and a local pending send may be and still match.
    pub(crate) reconcile_window_secs: Option<u64>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(%e, path = %path.display(), "ignoring malformed config");
            AppConfig::default()
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

impl AppConfig {
    pub(crate) fn api_base_url(&self) -> String {
        non_empty(std::env::var("KOOMIND_API_BASE_URL").ok().as_deref())
            .or_else(|| non_empty(self.api_base_url.as_deref()))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub(crate) fn socket_url(&self) -> String {
        non_empty(std::env::var("KOOMIND_SOCKET_URL").ok().as_deref())
            .or_else(|| non_empty(self.socket_url.as_deref()))
            .unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string())
    }

    pub(crate) fn notification_sound(&self) -> bool {
        self.notification_sound.unwrap_or(true)
    }

    pub(crate) fn desktop_notifications(&self) -> bool {
        self.desktop_notifications.unwrap_or(true)
    }

    pub(crate) fn reconcile_window(&self) -> chrono::Duration {
        let secs = self
            .reconcile_window_secs
            .unwrap_or(DEFAULT_RECONCILE_WINDOW_SECS)
            .min(i64::MAX as u64) as i64;
        chrono::Duration::seconds(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_app_config(dir.path().to_str().unwrap());
        assert!(config.notification_sound());
        assert!(config.desktop_notifications());
        assert_eq!(config.reconcile_window(), chrono::Duration::seconds(120));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"socket_url": "ws://chat.local/ws", "notification_sound": false, "reconcile_window_secs": 5}"#,
        )
        .unwrap();
        let config = load_app_config(dir.path().to_str().unwrap());
        assert_eq!(config.socket_url.as_deref(), Some("ws://chat.local/ws"));
        assert!(!config.notification_sound());
        assert!(config.desktop_notifications());
        assert_eq!(config.reconcile_window(), chrono::Duration::seconds(5));
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), b"{not json").unwrap();
        let config = load_app_config(dir.path().to_str().unwrap());
        assert!(config.socket_url.is_none());
    }
}
