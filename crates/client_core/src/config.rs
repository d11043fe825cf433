use std::{fs, time::Duration};

use serde::Deserialize;

/// Client-wide settings shared by every bound action.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// Delay before post-success redirects/reloads, in milliseconds.
    pub follow_up_delay_ms: u64,
    /// Whether the transport attaches the cookie jar to outbound requests.
    pub with_credentials: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            follow_up_delay_ms: 5_000,
            with_credentials: true,
        }
    }
}

impl ClientSettings {
    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.follow_up_delay_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    follow_up_delay_ms: Option<u64>,
    with_credentials: Option<bool>,
}

/// Defaults, overlaid by an optional `client.toml`, overlaid by environment
/// variables. Unreadable files and unparsable values fall back silently.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        apply_file(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("FORMRELAY_BASE_URL") {
        settings.base_url = v;
    }
    if let Ok(v) = std::env::var("FORMRELAY_FOLLOW_UP_DELAY_MS") {
        if let Ok(ms) = v.parse() {
            settings.follow_up_delay_ms = ms;
        }
    }
    if let Ok(v) = std::env::var("FORMRELAY_WITH_CREDENTIALS") {
        settings.with_credentials = v == "1" || v.eq_ignore_ascii_case("true");
    }

    settings
}

fn apply_file(settings: &mut ClientSettings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<FileSettings>(raw) {
        if let Some(v) = file_cfg.base_url {
            settings.base_url = v;
        }
        if let Some(v) = file_cfg.follow_up_delay_ms {
            settings.follow_up_delay_ms = v;
        }
        if let Some(v) = file_cfg.with_credentials {
            settings.with_credentials = v;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
